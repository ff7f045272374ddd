//! BRS Domain Layer - Pure Validation and Record Logic
//!
//! This crate contains the pure domain logic for BRS (Battle Results Streaming)
//! with no I/O and no async runtime. It is the leaf of the workspace: every
//! other crate depends on it, it depends on nothing but serialization helpers.
//!
//! ## Architecture
//!
//! - **Validation**: composable JSON-shape validators producing path-qualified
//!   errors (`Expected $.payload.after to be a number.`)
//! - **Entities**: immutable result records stored by the replay log

#![warn(missing_docs)]

pub mod entities;
pub mod validation;

pub use entities::{ResultRecord, Timestamp};
pub use validation::{
    Field, JsonKind, JsonPath, PathSegment, SharedValidator, ValidationError, ValidationResult,
    Validator,
};

/// Re-export commonly used validator constructors
pub mod prelude {
    pub use crate::validation::combinators::{
        any, array, boolean, fail, field, integer, literal, null, nullable, number, object,
        object_with_keys, one_of, optional_field, record, string, tuple,
    };
    pub use crate::validation::{
        Field, SharedValidator, ValidationError, ValidationResult, Validator,
    };
}
