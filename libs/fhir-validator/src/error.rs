use crate::validator::ValidationOutcome;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("constraint '{0}' is both suppressed and given a level override")]
    SuppressedAndOverridden(String),

    #[error("constraint '{id}' has conflicting level overrides")]
    ConflictingOverrides { id: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Failure of [`crate::ConstraintValidator::build`]: either the builder
/// rejected the node structurally, or a blocking constraint failed.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Structural(#[from] ferrum_model::Error),

    #[error("{} constraint violation(s)", .0.error_count())]
    Constraints(Box<ValidationOutcome>),
}

impl BuildError {
    /// The constraint outcome, when the node was built but rejected.
    pub fn outcome(&self) -> Option<&ValidationOutcome> {
        match self {
            BuildError::Constraints(outcome) => Some(outcome),
            BuildError::Structural(_) => None,
        }
    }
}
