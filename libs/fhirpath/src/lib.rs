//! Constraint expression engine
//!
//! A FHIRPath-based expression language for the invariants declared on
//! element types (`ele-1`, `per-1`, ...), evaluated directly over
//! [`ferrum_model::Node`] trees:
//!
//! ```text
//! Expression String
//!      |
//!   Lexer -> Tokens
//!      |
//!   Parser -> AST (cached per expression)
//!      |
//!   Evaluator (Context: %resource, %rootResource, %context) -> Collection
//! ```
//!
//! # Example
//!
//! ```rust
//! use ferrum_fhirpath::{Context, Engine};
//! use ferrum_model::datatypes;
//!
//! let period = datatypes::period(Some("2024-01-01"), Some("2023-12-31")).unwrap();
//! let engine = Engine::new();
//! let result = engine
//!     .evaluate("start <= end", &Context::new(period))
//!     .unwrap();
//! assert_eq!(result.as_boolean().unwrap(), Some(false));
//! ```

pub mod ast;
pub mod context;
pub mod engine;
pub mod error;
mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
mod temporal;
pub mod token;
pub mod value;

pub use context::Context;
pub use engine::Engine;
pub use error::{Error, Result};
pub use value::{Collection, Value};
