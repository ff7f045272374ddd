//! Validator primitives and combinators
//!
//! Every constructor returns a [`SharedValidator`], so schemas compose by
//! plain function application:
//!
//! ```
//! # use brs_domain::prelude::*;
//! # use serde_json::json;
//! let id = one_of([string(), number(), null()]);
//! let request = record([field("method", string()), field("id", id)]);
//!
//! assert!(request.validate(&json!({"method": "x", "id": 7})).is_ok());
//! assert!(request.validate(&json!({"method": "x", "id": true})).is_err());
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::error::{CONTEXT_PLACEHOLDER, ValidationError, ValidationResult};
use super::path::PathSegment;
use super::{SharedValidator, Validator};

/// Primitive JSON kinds recognised by [`TypeCheck`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonKind {
    /// JSON string
    String,
    /// Any JSON number
    Number,
    /// JSON number without a fractional part
    Integer,
    /// `true` or `false`
    Boolean,
    /// `null`
    Null,
}

impl JsonKind {
    /// Whether `value` is of this kind
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Null => value.is_null(),
        }
    }

    fn expectation(self) -> &'static str {
        match self {
            Self::String => "be a string",
            Self::Number => "be a number",
            Self::Integer => "be an integer",
            Self::Boolean => "be a boolean",
            Self::Null => "be null",
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
        };
        f.write_str(name)
    }
}

/// Accepts every value unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Any;

impl Validator for Any {
    fn validate(&self, value: &Value) -> ValidationResult<Value> {
        Ok(value.clone())
    }
}

/// Accepts exactly one value
#[derive(Debug, Clone)]
pub struct Literal {
    expected: Value,
}

impl Validator for Literal {
    fn validate(&self, value: &Value) -> ValidationResult<Value> {
        if *value == self.expected {
            Ok(value.clone())
        } else {
            Err(ValidationError::expected(format!("equal {}", self.expected)))
        }
    }
}

/// Accepts values of one primitive kind
#[derive(Debug, Clone, Copy)]
pub struct TypeCheck {
    kind: JsonKind,
}

impl Validator for TypeCheck {
    fn validate(&self, value: &Value) -> ValidationResult<Value> {
        if self.kind.matches(value) {
            Ok(value.clone())
        } else {
            Err(ValidationError::expected(self.kind.expectation()))
        }
    }
}

/// Always fails with a fixed message template (forbids a field)
#[derive(Debug, Clone)]
pub struct Fail {
    template: String,
}

impl Validator for Fail {
    fn validate(&self, _value: &Value) -> ValidationResult<Value> {
        Err(ValidationError::new(self.template.clone()))
    }
}

/// Validates every element of an array
pub struct ArrayOf {
    element: SharedValidator,
}

impl Validator for ArrayOf {
    fn validate(&self, value: &Value) -> ValidationResult<Value> {
        let items = value
            .as_array()
            .ok_or_else(|| ValidationError::expected("be an array"))?;

        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                self.element
                    .validate(item)
                    .map_err(|err| err.within_index(index))
            })
            .collect::<ValidationResult<Vec<_>>>()
            .map(Value::Array)
    }
}

/// Validates a fixed-length array position by position
pub struct Tuple {
    elements: Vec<SharedValidator>,
}

impl Validator for Tuple {
    fn validate(&self, value: &Value) -> ValidationResult<Value> {
        let items = value
            .as_array()
            .ok_or_else(|| ValidationError::expected("be an array"))?;

        if items.len() != self.elements.len() {
            return Err(ValidationError::expected(format!(
                "be an array of length {}",
                self.elements.len()
            )));
        }

        items
            .iter()
            .zip(&self.elements)
            .enumerate()
            .map(|(index, (item, validator))| {
                validator
                    .validate(item)
                    .map_err(|err| err.within_index(index))
            })
            .collect::<ValidationResult<Vec<_>>>()
            .map(Value::Array)
    }
}

/// Validates every value (and optionally every key) of an arbitrary mapping
pub struct ObjectOf {
    value: SharedValidator,
    key: Option<SharedValidator>,
}

impl Validator for ObjectOf {
    fn validate(&self, value: &Value) -> ValidationResult<Value> {
        let entries = value
            .as_object()
            .ok_or_else(|| ValidationError::expected("be an object"))?;

        let mut validated = Map::with_capacity(entries.len());
        for (key, contained) in entries {
            let key = match &self.key {
                Some(key_validator) => validate_key(key_validator.as_ref(), key)?,
                None => key.clone(),
            };
            let contained = self
                .value
                .validate(contained)
                .map_err(|err| err.within_field(key.as_str()))?;
            validated.insert(key, contained);
        }
        Ok(Value::Object(validated))
    }
}

fn validate_key(validator: &dyn Validator, key: &str) -> ValidationResult<String> {
    let in_key = |err: ValidationError| err.within(PathSegment::Key(key.to_owned()));
    match validator.validate(&Value::String(key.to_owned())).map_err(in_key)? {
        Value::String(validated) => Ok(validated),
        _ => Err(in_key(ValidationError::expected("be a string"))),
    }
}

/// Declared property of a [`Record`]
#[derive(Clone)]
pub struct Field {
    name: String,
    validator: SharedValidator,
    optional: bool,
}

impl Field {
    /// Property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the property may be absent
    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

/// Object with a declared set of properties.
///
/// Undeclared properties pass through untouched; missing optional
/// properties stay absent in the output.
#[derive(Debug)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    /// Declared fields in declaration order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

impl Validator for Record {
    fn validate(&self, value: &Value) -> ValidationResult<Value> {
        let entries = value
            .as_object()
            .ok_or_else(|| ValidationError::expected("be an object"))?;

        let mut validated = entries.clone();
        for field in &self.fields {
            match entries.get(&field.name) {
                Some(contained) => {
                    let contained = field
                        .validator
                        .validate(contained)
                        .map_err(|err| err.within_field(field.name.as_str()))?;
                    validated.insert(field.name.clone(), contained);
                }
                None if field.optional => {}
                None => {
                    return Err(ValidationError::expected(format!(
                        "have a property \"{}\"",
                        field.name
                    )));
                }
            }
        }
        Ok(Value::Object(validated))
    }
}

/// Tries alternatives in order and keeps the first success
pub struct OneOf {
    alternatives: Vec<SharedValidator>,
}

impl Validator for OneOf {
    fn validate(&self, value: &Value) -> ValidationResult<Value> {
        let mut failures = Vec::with_capacity(self.alternatives.len());
        for alternative in &self.alternatives {
            match alternative.validate(value) {
                Ok(validated) => return Ok(validated),
                Err(err) => failures.push(err),
            }
        }

        let mut template = String::from("Expected at least one of these to succeed:");
        for failure in &failures {
            template.push_str("\n - ");
            template.push_str(&failure.relative_message());
        }
        if failures.is_empty() {
            template = format!("Expected {CONTEXT_PLACEHOLDER} to match an alternative.");
        }
        Err(ValidationError::new(template))
    }
}

/// Accepts any value.
pub fn any() -> SharedValidator {
    Arc::new(Any)
}

/// Accepts exactly `expected`.
pub fn literal(expected: impl Into<Value>) -> SharedValidator {
    Arc::new(Literal {
        expected: expected.into(),
    })
}

/// Accepts values of the given primitive kind.
pub fn type_check(kind: JsonKind) -> SharedValidator {
    Arc::new(TypeCheck { kind })
}

/// Accepts strings.
pub fn string() -> SharedValidator {
    type_check(JsonKind::String)
}

/// Accepts any number.
pub fn number() -> SharedValidator {
    type_check(JsonKind::Number)
}

/// Accepts integral numbers.
pub fn integer() -> SharedValidator {
    type_check(JsonKind::Integer)
}

/// Accepts booleans.
pub fn boolean() -> SharedValidator {
    type_check(JsonKind::Boolean)
}

/// Accepts `null`.
pub fn null() -> SharedValidator {
    type_check(JsonKind::Null)
}

/// Always fails; `template` may reference `{context}`.
pub fn fail(template: impl Into<String>) -> SharedValidator {
    Arc::new(Fail {
        template: template.into(),
    })
}

/// Array whose elements all satisfy `element`.
pub fn array(element: SharedValidator) -> SharedValidator {
    Arc::new(ArrayOf { element })
}

/// Fixed-length array, one validator per position.
pub fn tuple(elements: impl IntoIterator<Item = SharedValidator>) -> SharedValidator {
    Arc::new(Tuple {
        elements: elements.into_iter().collect(),
    })
}

/// Mapping whose values all satisfy `value`.
pub fn object(value: SharedValidator) -> SharedValidator {
    Arc::new(ObjectOf { value, key: None })
}

/// Mapping whose keys satisfy `key` and values satisfy `value`.
pub fn object_with_keys(value: SharedValidator, key: SharedValidator) -> SharedValidator {
    Arc::new(ObjectOf {
        value,
        key: Some(key),
    })
}

/// Required record property.
pub fn field(name: impl Into<String>, validator: SharedValidator) -> Field {
    Field {
        name: name.into(),
        validator,
        optional: false,
    }
}

/// Optional record property.
pub fn optional_field(name: impl Into<String>, validator: SharedValidator) -> Field {
    Field {
        name: name.into(),
        validator,
        optional: true,
    }
}

/// Object with declared fields, undeclared ones pass through.
pub fn record(fields: impl IntoIterator<Item = Field>) -> SharedValidator {
    Arc::new(Record {
        fields: fields.into_iter().collect(),
    })
}

/// First alternative that succeeds wins.
pub fn one_of(alternatives: impl IntoIterator<Item = SharedValidator>) -> SharedValidator {
    Arc::new(OneOf {
        alternatives: alternatives.into_iter().collect(),
    })
}

/// `null` or whatever `validator` accepts.
pub fn nullable(validator: SharedValidator) -> SharedValidator {
    one_of([null(), validator])
}
