//! Path-qualified validation errors

use super::path::{JsonPath, PathSegment};

/// Placeholder substituted with the rendered path when a message is displayed
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Root symbol every rendered path starts with
const ROOT: &str = "$";

/// Validation result type
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation failure with the JSON path where it happened.
///
/// The message is kept as a template containing [`CONTEXT_PLACEHOLDER`] and
/// is only rendered on display, so enclosing validators can keep prepending
/// path segments without re-parsing text. The rendered form reads
/// `Expected $.payload.after to be a number.`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", render(.template, .path, ROOT))]
pub struct ValidationError {
    template: String,
    path: JsonPath,
}

impl ValidationError {
    /// Create an error from a message template containing `{context}`
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            path: JsonPath::root(),
        }
    }

    /// Create the common `Expected {context} to <expectation>.` error
    pub fn expected(expectation: impl AsRef<str>) -> Self {
        Self::new(format!(
            "Expected {CONTEXT_PLACEHOLDER} to {}.",
            expectation.as_ref()
        ))
    }

    /// Prepend a path segment (used while the error propagates outward)
    #[must_use]
    pub fn within(mut self, segment: PathSegment) -> Self {
        self.path.prepend(segment);
        self
    }

    /// Prepend an object property segment
    #[must_use]
    pub fn within_field(self, name: impl Into<String>) -> Self {
        self.within(PathSegment::Field(name.into()))
    }

    /// Prepend an array index segment
    #[must_use]
    pub fn within_index(self, index: usize) -> Self {
        self.within(PathSegment::Index(index))
    }

    /// Path relative to the value the outermost validator saw
    pub fn path(&self) -> &JsonPath {
        &self.path
    }

    /// Rendered context, e.g. `$.payload.after`
    pub fn context(&self) -> String {
        format!("{ROOT}{}", self.path)
    }

    /// Raw message template
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Message with the placeholder kept in front of the relative path.
    ///
    /// Aggregating validators embed this form so the branch messages pick up
    /// the aggregate's own context once it is known.
    pub(crate) fn relative_message(&self) -> String {
        render(&self.template, &self.path, CONTEXT_PLACEHOLDER)
    }
}

fn render(template: &str, path: &JsonPath, root: &str) -> String {
    template.replace(CONTEXT_PLACEHOLDER, &format!("{root}{path}"))
}
