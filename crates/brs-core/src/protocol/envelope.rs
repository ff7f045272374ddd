//! Inbound and outbound envelope model
//!
//! Two wire flavors share one connection. A JSON object carrying a `jsonrpc`
//! key is treated as JSON-RPC 2.0; anything else is a tagged
//! `{"type": ..., "payload": ...}` message.

use brs_domain::ResultRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value, json};

use super::error::ProtocolError;

/// JSON-RPC protocol version string
pub const JSONRPC_VERSION: &str = "2.0";

/// Message type used for tagged error reports
pub const ERROR_MESSAGE_TYPE: &str = "ERROR";

/// Wire flavor of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flavor {
    /// `{"type": ..., "payload": ...}`
    #[default]
    Tagged,
    /// JSON-RPC 2.0
    JsonRpc,
}

impl Flavor {
    /// Detect the flavor of a parsed JSON value
    pub fn detect(value: &Value) -> Self {
        match value {
            Value::Object(map) if map.contains_key("jsonrpc") => Self::JsonRpc,
            _ => Self::Tagged,
        }
    }
}

impl std::fmt::Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tagged => f.write_str("tagged"),
            Self::JsonRpc => f.write_str("json-rpc"),
        }
    }
}

/// JSON-RPC request identifier
#[derive(Debug, Clone, PartialEq)]
pub enum RequestId {
    /// Numeric id
    Number(Number),
    /// String id
    String(String),
    /// Explicit `null` id
    Null,
}

impl RequestId {
    /// Read a well-typed `id` member from a raw message, if one is present
    pub fn detect(value: &Value) -> Option<Self> {
        match value.get("id")? {
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Null => Some(Self::Null),
            _ => None,
        }
    }

    /// JSON form of the id
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Null => Value::Null,
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// A decoded, shape-checked inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Tagged message; every tagged message expects at most one reply
    Tagged {
        /// Value of `type`
        kind: String,
        /// Value of `payload`; `None` when absent or `null`
        payload: Option<Value>,
    },
    /// JSON-RPC request carrying an `id`
    Request {
        /// Method name
        method: String,
        /// Parameters, if present
        params: Option<Value>,
        /// Request id
        id: RequestId,
    },
    /// JSON-RPC notification without an `id`
    Notification {
        /// Method name
        method: String,
        /// Parameters, if present
        params: Option<Value>,
    },
}

impl Envelope {
    /// Build an envelope from a value already checked against its flavor's shape
    pub(crate) fn from_checked(flavor: Flavor, value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        match flavor {
            Flavor::Tagged => Some(Self::Tagged {
                kind: object.get("type")?.as_str()?.to_string(),
                payload: object.get("payload").filter(|p| !p.is_null()).cloned(),
            }),
            Flavor::JsonRpc => {
                let method = object.get("method")?.as_str()?.to_string();
                let params = object.get("params").cloned();
                if object.contains_key("id") {
                    Some(Self::Request {
                        method,
                        params,
                        id: RequestId::detect(value)?,
                    })
                } else {
                    Some(Self::Notification { method, params })
                }
            }
        }
    }

    /// Message type or method name used for routing
    pub fn name(&self) -> &str {
        match self {
            Self::Tagged { kind, .. } => kind,
            Self::Request { method, .. } | Self::Notification { method, .. } => method,
        }
    }

    /// Payload or params, if present
    pub fn params(&self) -> Option<&Value> {
        match self {
            Self::Tagged { payload, .. } => payload.as_ref(),
            Self::Request { params, .. } | Self::Notification { params, .. } => params.as_ref(),
        }
    }

    /// Request id of JSON-RPC requests
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Wire flavor of this envelope
    pub fn flavor(&self) -> Flavor {
        match self {
            Self::Tagged { .. } => Flavor::Tagged,
            Self::Request { .. } | Self::Notification { .. } => Flavor::JsonRpc,
        }
    }

    /// Field name that holds the parameters on the wire
    pub fn params_field(&self) -> &'static str {
        match self.flavor() {
            Flavor::Tagged => "payload",
            Flavor::JsonRpc => "params",
        }
    }

    /// JSON form of the envelope
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        match self {
            Self::Tagged { kind, payload } => {
                object.insert("type".into(), Value::String(kind.clone()));
                if let Some(payload) = payload {
                    object.insert("payload".into(), payload.clone());
                }
            }
            Self::Request { method, params, id } => {
                object.insert("jsonrpc".into(), JSONRPC_VERSION.into());
                object.insert("method".into(), Value::String(method.clone()));
                if let Some(params) = params {
                    object.insert("params".into(), params.clone());
                }
                object.insert("id".into(), id.to_value());
            }
            Self::Notification { method, params } => {
                object.insert("jsonrpc".into(), JSONRPC_VERSION.into());
                object.insert("method".into(), Value::String(method.clone()));
                if let Some(params) = params {
                    object.insert("params".into(), params.clone());
                }
            }
        }
        Value::Object(object)
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorObject {
    /// Numeric error code
    pub code: i64,
    /// Short description
    pub message: String,
    /// Optional detail
    pub data: Option<Value>,
}

impl From<&ProtocolError> for ErrorObject {
    fn from(err: &ProtocolError) -> Self {
        let code = err.code();
        Self {
            code: code.rpc_code(),
            message: code.rpc_message().to_string(),
            data: err.rpc_data(),
        }
    }
}

/// An outbound message before encoding
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// Tagged message `{"type": kind, "payload": payload}`
    Message {
        /// Message type
        kind: String,
        /// Payload
        payload: Value,
    },
    /// JSON-RPC success response
    Success {
        /// Id of the originating request
        id: RequestId,
        /// Result value
        result: Value,
    },
    /// JSON-RPC error response
    Failure {
        /// Id of the originating request, `Null` when unknown
        id: RequestId,
        /// Error object
        error: ErrorObject,
    },
    /// JSON-RPC notification sent by the server
    Notification {
        /// Method name
        method: String,
        /// Parameters
        params: Value,
    },
    /// JSON-RPC batch response
    Batch(Vec<Outgoing>),
}

impl Outgoing {
    /// Tagged message
    pub fn message(kind: impl Into<String>, payload: Value) -> Self {
        Self::Message {
            kind: kind.into(),
            payload,
        }
    }

    /// Error report in the given flavor.
    ///
    /// JSON-RPC errors always carry an id; `None` becomes `null`.
    pub fn error(flavor: Flavor, id: Option<RequestId>, err: &ProtocolError) -> Self {
        match flavor {
            Flavor::Tagged => Self::message(
                ERROR_MESSAGE_TYPE,
                json!({
                    "type": err.code().tag(),
                    "message": err.public_message(),
                }),
            ),
            Flavor::JsonRpc => Self::Failure {
                id: id.unwrap_or(RequestId::Null),
                error: ErrorObject::from(err),
            },
        }
    }

    /// JSON form of the message
    pub fn to_value(&self) -> Value {
        match self {
            Self::Message { kind, payload } => json!({"type": kind, "payload": payload}),
            Self::Success { id, result } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "result": result,
                "id": id.to_value(),
            }),
            Self::Failure { id, error } => {
                let mut body = Map::new();
                body.insert("code".into(), error.code.into());
                body.insert("message".into(), Value::String(error.message.clone()));
                if let Some(data) = &error.data {
                    body.insert("data".into(), data.clone());
                }
                json!({
                    "jsonrpc": JSONRPC_VERSION,
                    "error": Value::Object(body),
                    "id": id.to_value(),
                })
            }
            Self::Notification { method, params } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "method": method,
                "params": params,
            }),
            Self::Batch(items) => Value::Array(items.iter().map(Self::to_value).collect()),
        }
    }
}

/// Tagged message type carrying a stored result
pub const RESULT_MESSAGE_TYPE: &str = "BATTLE_RESULT";

/// JSON-RPC notification method carrying a stored result
pub const RESULT_NOTIFICATION_METHOD: &str = "battle_result";

/// Push form of a stored record in the given flavor
pub fn record_message(flavor: Flavor, record: &ResultRecord) -> Outgoing {
    match flavor {
        Flavor::Tagged => Outgoing::message(RESULT_MESSAGE_TYPE, record.to_wire()),
        Flavor::JsonRpc => Outgoing::Notification {
            method: RESULT_NOTIFICATION_METHOD.to_string(),
            params: record.to_wire(),
        },
    }
}
