//! Constraint validation for ferrum-model nodes
//!
//! Structural checks run inside `Builder::build`; this crate adds the
//! declarative invariants (`ele-1`, `per-1`, `ref-1`, ...) attached to each
//! type. Validation follows three phases:
//!
//! 1. [`ConstraintsConfig`]: declarative, serializable (presets, builder, YAML)
//! 2. [`ConstraintPlan`]: compiled and checked for coherence
//! 3. [`ConstraintValidator`]: reusable; walks a node tree with the visitor
//!    protocol and evaluates every applicable constraint
//!
//! ```rust
//! use ferrum_model::datatypes;
//! use ferrum_validator::{ConstraintValidator, ConstraintsConfig, Preset};
//!
//! let validator =
//!     ConstraintValidator::from_config(&ConstraintsConfig::preset(Preset::Strict)).unwrap();
//! let period = datatypes::period(Some("2024-06-01"), Some("2024-01-01")).unwrap();
//! let outcome = validator.validate(&period);
//! assert!(!outcome.valid);
//! assert_eq!(outcome.issues_for("per-1").count(), 1);
//! ```

mod config;
mod error;
mod plan;
mod validator;

pub use config::{
    ConstraintId, ConstraintLevel, ConstraintLevelOverride, ConstraintsConfig,
    ConstraintsConfigBuilder, ConstraintsMode, Preset, WarningMode,
};
pub use error::{BuildError, ConfigError};
pub use plan::ConstraintPlan;
pub use validator::{
    ConstraintValidator, IssueCode, IssueSeverity, ValidationIssue, ValidationOutcome,
};
