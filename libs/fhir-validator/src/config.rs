//! Declarative constraint configuration
//!
//! A [`ConstraintsConfig`] is plain, serializable data. It is built from a
//! [`Preset`], the fluent [`ConstraintsConfigBuilder`] or YAML, and turned
//! into an immutable [`ConstraintPlan`] by [`ConstraintsConfig::compile`],
//! which rejects incoherent combinations.

use crate::plan::ConstraintPlan;
use crate::validator::IssueSeverity;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Named starting points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    /// No constraint evaluation
    Off,
    /// Rules only, reported without rejecting
    Lenient,
    /// Rules and warnings; failing rules make the outcome invalid
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintsMode {
    Off,
    Full,
}

/// What to do with `Warning`-severity constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningMode {
    Ignore,
    Report,
}

/// Constraint key such as `ele-1` or `coverage-0`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintId(pub String);

impl From<&str> for ConstraintId {
    fn from(id: &str) -> Self {
        ConstraintId(id.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintLevel {
    Error,
    Warning,
    Information,
}

impl From<ConstraintLevel> for IssueSeverity {
    fn from(level: ConstraintLevel) -> Self {
        match level {
            ConstraintLevel::Error => IssueSeverity::Error,
            ConstraintLevel::Warning => IssueSeverity::Warning,
            ConstraintLevel::Information => IssueSeverity::Information,
        }
    }
}

/// Report a constraint at a different severity than it declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintLevelOverride {
    pub id: ConstraintId,
    pub level: ConstraintLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintsConfig {
    pub mode: ConstraintsMode,
    pub warnings: WarningMode,
    pub suppress: Vec<ConstraintId>,
    pub level_overrides: Vec<ConstraintLevelOverride>,
    /// Failing `Rule` constraints make the outcome invalid
    pub strict: bool,
    pub max_issues: usize,
    /// Evaluate the constraints of nested elements, not only the root's
    pub recurse: bool,
}

impl Default for ConstraintsConfig {
    fn default() -> Self {
        Self::preset(Preset::Lenient)
    }
}

impl ConstraintsConfig {
    pub fn preset(preset: Preset) -> Self {
        let base = Self {
            mode: ConstraintsMode::Full,
            warnings: WarningMode::Ignore,
            suppress: Vec::new(),
            level_overrides: Vec::new(),
            strict: false,
            max_issues: 1000,
            recurse: true,
        };
        match preset {
            Preset::Off => Self {
                mode: ConstraintsMode::Off,
                ..base
            },
            Preset::Lenient => base,
            Preset::Strict => Self {
                warnings: WarningMode::Report,
                strict: true,
                ..base
            },
        }
    }

    pub fn builder() -> ConstraintsConfigBuilder {
        ConstraintsConfigBuilder::default()
    }

    /// Parse YAML. A top-level `preset` key selects the starting point the
    /// remaining keys are applied over.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let mut raw: serde_yaml::Mapping = match serde_yaml::from_str(yaml)? {
            serde_yaml::Value::Null => serde_yaml::Mapping::new(),
            value => serde_yaml::from_value(value)?,
        };
        let preset = match raw.remove("preset") {
            Some(value) => serde_yaml::from_value(value)?,
            None => Preset::Lenient,
        };
        let mut merged = match serde_yaml::to_value(Self::preset(preset))? {
            serde_yaml::Value::Mapping(mapping) => mapping,
            _ => serde_yaml::Mapping::new(),
        };
        for (key, value) in raw {
            merged.insert(key, value);
        }
        Ok(serde_yaml::from_value(serde_yaml::Value::Mapping(merged))?)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check the configuration and freeze it into a plan.
    pub fn compile(&self) -> Result<ConstraintPlan, ConfigError> {
        if self.max_issues == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_issues must be at least 1".into(),
            ));
        }

        let mut suppress = HashSet::new();
        for id in &self.suppress {
            if id.0.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "suppressed constraint id is empty".into(),
                ));
            }
            suppress.insert(id.0.clone());
        }

        let mut overrides: HashMap<String, IssueSeverity> = HashMap::new();
        for ov in &self.level_overrides {
            if suppress.contains(&ov.id.0) {
                return Err(ConfigError::SuppressedAndOverridden(ov.id.0.clone()));
            }
            let level = IssueSeverity::from(ov.level);
            match overrides.insert(ov.id.0.clone(), level) {
                Some(previous) if previous != level => {
                    return Err(ConfigError::ConflictingOverrides {
                        id: ov.id.0.clone(),
                    })
                }
                _ => {}
            }
        }

        Ok(ConstraintPlan {
            enabled: self.mode == ConstraintsMode::Full,
            report_warnings: self.warnings == WarningMode::Report,
            suppress,
            overrides,
            strict: self.strict,
            max_issues: self.max_issues,
            recurse: self.recurse,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintsConfigBuilder {
    config: ConstraintsConfig,
}

impl ConstraintsConfigBuilder {
    /// Reset every option to the preset's values.
    pub fn preset(mut self, preset: Preset) -> Self {
        self.config = ConstraintsConfig::preset(preset);
        self
    }

    pub fn mode(mut self, mode: ConstraintsMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn warnings(mut self, warnings: WarningMode) -> Self {
        self.config.warnings = warnings;
        self
    }

    pub fn suppress(mut self, id: impl Into<ConstraintId>) -> Self {
        self.config.suppress.push(id.into());
        self
    }

    pub fn level_override(mut self, id: impl Into<ConstraintId>, level: ConstraintLevel) -> Self {
        self.config.level_overrides.push(ConstraintLevelOverride {
            id: id.into(),
            level,
        });
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    pub fn max_issues(mut self, max_issues: usize) -> Self {
        self.config.max_issues = max_issues;
        self
    }

    pub fn recurse(mut self, recurse: bool) -> Self {
        self.config.recurse = recurse;
        self
    }

    pub fn build(self) -> ConstraintsConfig {
        self.config
    }
}
