//! Model configuration
//!
//! Switches that control structural validation in `Builder::build`. A
//! `TypeRegistry` carries one `ModelConfig`; builders created from the
//! registry inherit it and may still toggle validation per builder.

use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Run structural validation at all. Disable only for trusted input.
    pub validate: bool,
    /// Check reference literals against the field's target whitelist.
    pub check_reference_types: bool,
    /// Reject control characters below U+0020 other than tab, CR and LF.
    pub check_control_chars: bool,
    /// Apply the lexical rules of primitive types (id, code, uri, dates...).
    pub check_primitive_values: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            validate: true,
            check_reference_types: true,
            check_control_chars: true,
            check_primitive_values: true,
        }
    }
}

impl ModelConfig {
    /// Configuration for reconstructing nodes from an already-trusted source.
    pub fn trusted() -> Self {
        Self {
            validate: false,
            ..Self::default()
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_enable_everything() {
        let cfg = ModelConfig::default();
        assert!(cfg.validate);
        assert!(cfg.check_reference_types);
        assert!(cfg.check_control_chars);
        assert!(cfg.check_primitive_values);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = ModelConfig::from_yaml("check_reference_types: false\n").unwrap();
        assert!(!cfg.check_reference_types);
        assert!(cfg.validate);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let cfg = ModelConfig::trusted();
        let yaml = cfg.to_yaml().unwrap();
        assert_eq!(ModelConfig::from_yaml(&yaml).unwrap(), cfg);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = ModelConfig::from_yaml("validate: [not, a, bool]").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
