//! Protocol error taxonomy
//!
//! Every failure that can be reported to a peer maps to one [`ErrorCode`],
//! which carries both wire identifiers: the tagged-envelope name
//! (`JSON_DECODE`, `UNRECOGNISED_COMMAND`, ...) and the JSON-RPC 2.0 code.

use brs_domain::ValidationError;
use serde_json::Value;

/// Stable machine-readable error identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Text was not valid JSON
    ParseError,
    /// JSON did not have the shape of an envelope
    InvalidRequest,
    /// No handler registered under the requested name
    MethodNotFound,
    /// Payload did not satisfy the handler's validator
    InvalidParams,
    /// Handler failed; details stay server-side
    InternalError,
}

impl ErrorCode {
    /// Identifier used in tagged `ERROR` payloads
    pub fn tag(self) -> &'static str {
        match self {
            Self::ParseError => "JSON_DECODE",
            Self::InvalidRequest => "MALFORMED_MESSAGE",
            Self::MethodNotFound => "UNRECOGNISED_COMMAND",
            Self::InvalidParams => "MALFORMED_PAYLOAD",
            Self::InternalError => "INTERNAL",
        }
    }

    /// JSON-RPC 2.0 error code
    pub fn rpc_code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
        }
    }

    /// JSON-RPC 2.0 error message
    pub fn rpc_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
        }
    }
}

/// Failure while decoding, routing or executing a message
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    /// Malformed JSON text
    #[error("malformed JSON: {message}")]
    Parse {
        /// Parser diagnostic
        message: String,
    },

    /// Envelope shape mismatch
    #[error("invalid envelope: {0}")]
    InvalidRequest(ValidationError),

    /// Unknown method or message type
    #[error("method not found: {method}")]
    MethodNotFound {
        /// Requested name
        method: String,
    },

    /// Handler parameters failed validation
    #[error("invalid params: {0}")]
    InvalidParams(ValidationError),

    /// Unexpected failure; `detail` is logged, never sent
    #[error("internal error: {detail}")]
    Internal {
        /// Server-side diagnostic
        detail: String,
    },
}

impl ProtocolError {
    /// Create a parse error from a serde diagnostic
    pub fn parse(source: &serde_json::Error) -> Self {
        Self::Parse {
            message: source.to_string(),
        }
    }

    /// Create a method-not-found error
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }

    /// Create an internal error
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// Error code for this failure
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Parse { .. } => ErrorCode::ParseError,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::MethodNotFound { .. } => ErrorCode::MethodNotFound,
            Self::InvalidParams(_) => ErrorCode::InvalidParams,
            Self::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Human-readable message safe to send to the peer
    pub fn public_message(&self) -> String {
        match self {
            Self::Parse { message } => message.clone(),
            Self::InvalidRequest(err) | Self::InvalidParams(err) => err.to_string(),
            Self::MethodNotFound { method } => format!("Command not recognized: {method}"),
            Self::Internal { .. } => "Internal error.".to_string(),
        }
    }

    /// JSON-RPC `error.data` member, absent for internal errors
    pub fn rpc_data(&self) -> Option<Value> {
        match self {
            Self::Internal { .. } => None,
            _ => Some(Value::String(self.public_message())),
        }
    }
}
