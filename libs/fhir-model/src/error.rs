//! Error types for the element model

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// One or more structural checks failed in `Builder::build`.
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Programmer error: the builder was driven in a way the schema forbids.
    #[error("Invalid builder usage: {0}")]
    InvalidBuilderUsage(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl Error {
    /// Structural violations carried by this error, empty for other kinds.
    pub fn violations(&self) -> &[StructuralViolation] {
        match self {
            Error::Validation(errors) => errors.violations(),
            _ => &[],
        }
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}

/// A single structural check failure. Every variant names the offending
/// element path (`Coverage.payor`, `Coverage.class[1].value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralViolation {
    MissingRequiredField {
        path: String,
    },
    NullListElement {
        path: String,
        index: usize,
    },
    ChoiceTypeViolation {
        path: String,
        actual: String,
        allowed: Vec<String>,
    },
    ReferenceTypeViolation {
        path: String,
        actual: String,
        allowed: Vec<String>,
    },
    ReferenceTypeMismatch {
        path: String,
        literal: String,
        declared: String,
    },
    EmptyLeafElement {
        path: String,
    },
    InvalidElementType {
        path: String,
        actual: String,
        expected: Vec<String>,
    },
    MaxCardinalityExceeded {
        path: String,
        max: u32,
        actual: usize,
    },
    InvalidPrimitiveValue {
        path: String,
        message: String,
    },
}

impl StructuralViolation {
    pub fn path(&self) -> &str {
        match self {
            Self::MissingRequiredField { path }
            | Self::NullListElement { path, .. }
            | Self::ChoiceTypeViolation { path, .. }
            | Self::ReferenceTypeViolation { path, .. }
            | Self::ReferenceTypeMismatch { path, .. }
            | Self::EmptyLeafElement { path }
            | Self::InvalidElementType { path, .. }
            | Self::MaxCardinalityExceeded { path, .. }
            | Self::InvalidPrimitiveValue { path, .. } => path,
        }
    }

    fn path_mut(&mut self) -> &mut String {
        match self {
            Self::MissingRequiredField { path }
            | Self::NullListElement { path, .. }
            | Self::ChoiceTypeViolation { path, .. }
            | Self::ReferenceTypeViolation { path, .. }
            | Self::ReferenceTypeMismatch { path, .. }
            | Self::EmptyLeafElement { path }
            | Self::InvalidElementType { path, .. }
            | Self::MaxCardinalityExceeded { path, .. }
            | Self::InvalidPrimitiveValue { path, .. } => path,
        }
    }

    /// Re-anchor a violation raised on a detached child (`code`) at the
    /// element it is placed in (`Coding.code`).
    pub(crate) fn rebased(mut self, from: &str, to: &str) -> Self {
        let path = self.path_mut();
        if let Some(rest) = path.strip_prefix(from) {
            if rest.is_empty() || rest.starts_with('.') || rest.starts_with('[') {
                *path = format!("{}{}", to, rest);
            }
        }
        self
    }

    /// Short machine-friendly name of the violation kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingRequiredField { .. } => "MissingRequiredField",
            Self::NullListElement { .. } => "NullListElement",
            Self::ChoiceTypeViolation { .. } => "ChoiceTypeViolation",
            Self::ReferenceTypeViolation { .. } => "ReferenceTypeViolation",
            Self::ReferenceTypeMismatch { .. } => "ReferenceTypeMismatch",
            Self::EmptyLeafElement { .. } => "EmptyLeafElement",
            Self::InvalidElementType { .. } => "InvalidElementType",
            Self::MaxCardinalityExceeded { .. } => "MaxCardinalityExceeded",
            Self::InvalidPrimitiveValue { .. } => "InvalidPrimitiveValue",
        }
    }
}

impl fmt::Display for StructuralViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequiredField { path } => {
                write!(f, "Missing required element: '{}'", path)
            }
            Self::NullListElement { path, index } => write!(
                f,
                "Repeating element: '{}' does not permit null elements (index {})",
                path, index
            ),
            Self::ChoiceTypeViolation {
                path,
                actual,
                allowed,
            } => write!(
                f,
                "Invalid type: {} for choice element: '{}' must be one of: [{}]",
                actual,
                path,
                allowed.join(", ")
            ),
            Self::ReferenceTypeViolation {
                path,
                actual,
                allowed,
            } => write!(
                f,
                "Resource type: {} referenced by element: '{}' must be one of: [{}]",
                actual,
                path,
                allowed.join(", ")
            ),
            Self::ReferenceTypeMismatch {
                path,
                literal,
                declared,
            } => write!(
                f,
                "Resource type found in reference value: '{}' for element: '{}' does not match Reference.type: {}",
                literal, path, declared
            ),
            Self::EmptyLeafElement { path } => write!(
                f,
                "ele-1: All FHIR elements must have a @value or children ('{}')",
                path
            ),
            Self::InvalidElementType {
                path,
                actual,
                expected,
            } => write!(
                f,
                "Invalid type: {} for element: '{}' must be: {}",
                actual,
                path,
                expected.join(" | ")
            ),
            Self::MaxCardinalityExceeded { path, max, actual } => write!(
                f,
                "Element: '{}' allows at most {} value(s), found {}",
                path, max, actual
            ),
            Self::InvalidPrimitiveValue { path, message } => {
                write!(f, "Invalid value for '{}': {}", path, message)
            }
        }
    }
}

/// All structural violations found by one `build()` call, in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    violations: Vec<StructuralViolation>,
}

impl ValidationErrors {
    pub fn new(violations: Vec<StructuralViolation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[StructuralViolation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<StructuralViolation> {
        self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StructuralViolation> {
        self.violations.iter()
    }

    /// Paths of all violations of the given kind.
    pub fn paths_of(&self, kind: &str) -> Vec<&str> {
        self.violations
            .iter()
            .filter(|v| v.kind() == kind)
            .map(|v| v.path())
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} structural violation(s)", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "\n  - {}", violation)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a StructuralViolation;
    type IntoIter = std::slice::Iter<'a, StructuralViolation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_display_names_path() {
        let v = StructuralViolation::MissingRequiredField {
            path: "Coverage.status".to_string(),
        };
        assert_eq!(v.to_string(), "Missing required element: 'Coverage.status'");
        assert_eq!(v.path(), "Coverage.status");
        assert_eq!(v.kind(), "MissingRequiredField");
    }

    #[test]
    fn test_choice_violation_lists_allowed_types() {
        let v = StructuralViolation::ChoiceTypeViolation {
            path: "Coverage.costToBeneficiary.value".to_string(),
            actual: "CodeableConcept".to_string(),
            allowed: vec!["Quantity".to_string(), "Money".to_string()],
        };
        assert!(v.to_string().contains("must be one of: [Quantity, Money]"));
    }

    #[test]
    fn test_validation_errors_filter_by_kind() {
        let errors = ValidationErrors::new(vec![
            StructuralViolation::MissingRequiredField {
                path: "A.x".to_string(),
            },
            StructuralViolation::EmptyLeafElement {
                path: "A.y".to_string(),
            },
        ]);
        assert_eq!(errors.paths_of("MissingRequiredField"), vec!["A.x"]);
        assert_eq!(errors.len(), 2);

        let err: Error = errors.into();
        assert_eq!(err.violations().len(), 2);
        assert!(err.to_string().starts_with("2 structural violation(s)"));
    }
}
