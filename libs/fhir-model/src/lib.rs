//! FHIR element model
//!
//! One generic node type interprets a schema table instead of one Rust type
//! per resource. The pieces, leaves first:
//!
//! - [`schema`]: type definitions (properties, cardinalities, choice sets,
//!   reference whitelists, constraints), the built-in core schema and a
//!   StructureDefinition loader
//! - [`Node`]: immutable, reference-counted element with extensions,
//!   modifier extensions and a memoized structural hash
//! - [`Builder`]: fluent staging area consumed by `build()`, which runs
//!   structural validation before a node exists
//! - [`choice`] and [`reference`]: tagged-union fields and typed weak pointers
//! - [`visitor`]: the traversal protocol used by encoders and validators
//!
//! # Example
//!
//! ```rust
//! use ferrum_model::{datatypes, schema, StructuralViolation};
//!
//! let err = schema::core()
//!     .builder("Coverage")?
//!     .add("payor", datatypes::reference("Organization/1")?)
//!     .build()
//!     .unwrap_err();
//!
//! assert_eq!(
//!     err.violations(),
//!     &[
//!         StructuralViolation::MissingRequiredField { path: "Coverage.status".into() },
//!         StructuralViolation::MissingRequiredField { path: "Coverage.beneficiary".into() },
//!     ]
//! );
//! # Ok::<(), ferrum_model::Error>(())
//! ```

pub mod builder;
pub mod choice;
pub mod config;
pub mod datatypes;
pub mod error;
pub mod node;
pub mod primitive;
pub mod reference;
pub mod resource_type;
pub mod schema;
mod validation;
pub mod visitor;

pub use builder::Builder;
pub use choice::{choice_element_name, ChoiceType};
pub use config::ModelConfig;
pub use error::{Error, Result, StructuralViolation, ValidationErrors};
pub use node::{Field, Node};
pub use primitive::PrimitiveValue;
pub use resource_type::is_resource_type;
pub use schema::{
    Cardinality, Constraint, ConstraintSeverity, Property, PropertyType, TypeDefinition, TypeKind,
    TypeRegistry,
};
pub use visitor::{collect_paths, PathVisitor, TraceVisitor, Visitor};
