//! Envelope codec
//!
//! Decoding parses text, detects the flavor of every message and checks it
//! against that flavor's envelope shape. Encoding re-checks outbound messages
//! against the outgoing shapes before they are serialized, so a handler can
//! never put a malformed frame on the wire.

use brs_domain::prelude::*;
use serde_json::Value;

use super::envelope::{Envelope, Flavor, JSONRPC_VERSION, Outgoing, RequestId};
use super::error::ProtocolError;

/// Top-level structure of an inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame<T> {
    /// A single message
    Single(T),
    /// A JSON array of messages
    Batch(Vec<T>),
}

/// Result of decoding one message
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Flavor replies must use
    pub flavor: Flavor,
    /// Request id, when one could be read even from a malformed message
    pub id: Option<RequestId>,
    /// Envelope or the reason it was rejected
    pub envelope: Result<Envelope, ProtocolError>,
}

/// Shape validators for both wire flavors
#[derive(Clone)]
pub struct Codec {
    default_flavor: Flavor,
    incoming_tagged: SharedValidator,
    incoming_rpc: SharedValidator,
    outgoing_tagged: SharedValidator,
    rpc_success: SharedValidator,
    rpc_failure: SharedValidator,
    rpc_notification: SharedValidator,
}

fn request_id() -> SharedValidator {
    one_of([string(), number(), null()])
}

fn jsonrpc_version() -> Field {
    field("jsonrpc", literal(JSONRPC_VERSION))
}

impl Codec {
    /// Create a codec; `default_flavor` is used for frames whose flavor
    /// cannot be detected, such as unparseable text
    pub fn new(default_flavor: Flavor) -> Self {
        let incoming_tagged = record([
            field("type", string()),
            optional_field("payload", nullable(object(any()))),
        ]);

        let incoming_rpc = record([
            jsonrpc_version(),
            field("method", string()),
            optional_field("params", one_of([array(any()), object(any())])),
            optional_field("id", request_id()),
        ]);

        let outgoing_tagged = record([field("type", string()), field("payload", any())]);

        let rpc_success = record([
            jsonrpc_version(),
            field("result", any()),
            field("id", request_id()),
        ]);

        let rpc_failure = record([
            jsonrpc_version(),
            field(
                "error",
                record([
                    field("code", integer()),
                    field("message", string()),
                    optional_field("data", any()),
                ]),
            ),
            field("id", request_id()),
        ]);

        let rpc_notification = record([
            jsonrpc_version(),
            field("method", string()),
            optional_field("params", any()),
            optional_field("id", fail("Expected {context} to not be present.")),
        ]);

        Self {
            default_flavor,
            incoming_tagged,
            incoming_rpc,
            outgoing_tagged,
            rpc_success,
            rpc_failure,
            rpc_notification,
        }
    }

    /// Flavor used when none can be detected
    pub fn default_flavor(&self) -> Flavor {
        self.default_flavor
    }

    /// Flavor a reply to `value` must use
    pub fn flavor_of(&self, value: &Value) -> Flavor {
        if value.is_object() {
            Flavor::detect(value)
        } else {
            self.default_flavor
        }
    }

    /// Parse a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Parse`] if the text is not valid JSON. Shape
    /// errors are reported per message inside the returned frame.
    pub fn decode(&self, text: &str) -> Result<Frame<Decoded>, ProtocolError> {
        let value: Value = serde_json::from_str(text).map_err(|e| ProtocolError::parse(&e))?;
        Ok(match value {
            Value::Array(items) => {
                Frame::Batch(items.iter().map(|item| self.decode_value(item)).collect())
            }
            other => Frame::Single(self.decode_value(&other)),
        })
    }

    /// Check one parsed message against its flavor's envelope shape
    pub fn decode_value(&self, value: &Value) -> Decoded {
        let flavor = self.flavor_of(value);
        let id = match flavor {
            Flavor::JsonRpc => RequestId::detect(value),
            Flavor::Tagged => None,
        };
        let shape = match flavor {
            Flavor::Tagged => &self.incoming_tagged,
            Flavor::JsonRpc => &self.incoming_rpc,
        };

        let envelope = shape
            .validate(value)
            .map_err(ProtocolError::InvalidRequest)
            .and_then(|checked| {
                Envelope::from_checked(flavor, &checked).ok_or_else(|| {
                    ProtocolError::InvalidRequest(ValidationError::expected("be an envelope"))
                })
            });

        Decoded {
            flavor,
            id,
            envelope,
        }
    }

    /// Check an outbound message against its shape and serialize it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Internal`] if the message does not match the
    /// outgoing shape for its kind or cannot be serialized.
    pub fn encode(&self, message: &Outgoing) -> Result<String, ProtocolError> {
        let value = message.to_value();
        self.check_outgoing(message, &value)?;
        serde_json::to_string(&value)
            .map_err(|e| ProtocolError::internal(format!("failed to serialize message: {e}")))
    }

    fn check_outgoing(&self, message: &Outgoing, value: &Value) -> Result<(), ProtocolError> {
        let shape = match message {
            Outgoing::Message { .. } => &self.outgoing_tagged,
            Outgoing::Success { .. } => &self.rpc_success,
            Outgoing::Failure { .. } => &self.rpc_failure,
            Outgoing::Notification { .. } => &self.rpc_notification,
            Outgoing::Batch(items) => {
                for (index, (item, item_value)) in items
                    .iter()
                    .zip(value.as_array().into_iter().flatten())
                    .enumerate()
                {
                    if !matches!(item, Outgoing::Success { .. } | Outgoing::Failure { .. }) {
                        return Err(ProtocolError::internal(format!(
                            "batch element {index} is not a response"
                        )));
                    }
                    self.check_outgoing(item, item_value)?;
                }
                return Ok(());
            }
        };
        shape
            .validate(value)
            .map(|_| ())
            .map_err(|e| ProtocolError::internal(format!("outgoing message rejected: {e}")))
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(Flavor::default())
    }
}
