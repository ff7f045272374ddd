//! JSON shape validation
//!
//! A validator is a pure function from a JSON value to either a (possibly
//! transformed) value or a [`ValidationError`]. Validators hold no mutable
//! state and are shared behind `Arc`, so one schema can be built once and
//! reused by every connection.
//!
//! Errors carry a [`JsonPath`] that grows outward: the innermost validator
//! reports `Expected {context} to be a number.`, each enclosing container
//! prepends its own segment, and the final message renders the full path
//! from the root `$`.
//!
//! # Examples
//! ```
//! # use brs_domain::prelude::*;
//! # use serde_json::json;
//! let replay = record([optional_field("after", number())]);
//!
//! assert!(replay.validate(&json!({"after": 1000})).is_ok());
//!
//! let err = replay.validate(&json!({"after": "soon"})).unwrap_err();
//! assert_eq!(err.to_string(), "Expected $.after to be a number.");
//! ```

pub mod combinators;
mod error;
mod path;

use std::sync::Arc;

use serde_json::Value;

pub use combinators::{Field, JsonKind};
pub use error::{ValidationError, ValidationResult};
pub use path::{JsonPath, PathSegment};

/// A composable JSON-shape check.
///
/// Implementations must be pure: the same input always yields the same
/// output, and validating never mutates shared state.
pub trait Validator: Send + Sync {
    /// Validate `value`, returning the accepted (optionally transformed) value.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] describing the first mismatch found, with
    /// the path relative to `value`.
    fn validate(&self, value: &Value) -> ValidationResult<Value>;
}

/// Validator shared between schemas and threads
pub type SharedValidator = Arc<dyn Validator>;

impl<V: Validator + ?Sized> Validator for Arc<V> {
    fn validate(&self, value: &Value) -> ValidationResult<Value> {
        (**self).validate(value)
    }
}

impl<V: Validator + ?Sized> Validator for Box<V> {
    fn validate(&self, value: &Value) -> ValidationResult<Value> {
        (**self).validate(value)
    }
}
