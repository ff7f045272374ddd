//! Method dispatcher
//!
//! Routes decoded envelopes to registered handlers, validates their
//! parameters and turns every outcome, including handler failures and
//! panics, into frames in the flavor of the triggering message.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use brs_domain::{SharedValidator, ValidationError};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::protocol::{Codec, Decoded, Envelope, Flavor, Frame, Outgoing, ProtocolError, RequestId};

/// Error type handlers may return; reported to the peer as an internal error
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// What a handler wants sent back
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Nothing for tagged messages, `result: null` for JSON-RPC requests
    Empty,
    /// One tagged message; JSON-RPC requests get `payload` as the result
    Message {
        /// Tagged message type
        kind: String,
        /// Payload
        payload: Value,
    },
    /// One tagged message per item; JSON-RPC requests get the items array
    Messages {
        /// Tagged message type
        kind: String,
        /// Payloads
        items: Vec<Value>,
    },
}

/// Per-call context handed to a handler
#[derive(Debug, Clone)]
pub struct CallContext<C> {
    /// Caller-supplied context, typically the connection
    pub context: C,
    /// Flavor of the triggering message
    pub flavor: Flavor,
    /// Method or message type being handled
    pub method: String,
}

type HandlerFn<C> = Arc<
    dyn Fn(Value, CallContext<C>) -> BoxFuture<'static, Result<Reply, HandlerError>> + Send + Sync,
>;

struct Route<C> {
    params: SharedValidator,
    handler: HandlerFn<C>,
}

/// Method registry and dispatch loop
pub struct Dispatcher<C> {
    codec: Codec,
    routes: HashMap<String, Route<C>>,
}

impl<C> Dispatcher<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Create a dispatcher with no registered methods
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            routes: HashMap::new(),
        }
    }

    /// Register `handler` under `name`.
    ///
    /// Parameters are checked against `params` before the handler runs.
    /// Registering a name twice replaces the earlier handler.
    pub fn register<F, Fut>(
        &mut self,
        name: impl Into<String>,
        params: SharedValidator,
        handler: F,
    ) where
        F: Fn(Value, CallContext<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
    {
        let name = name.into();
        let handler: HandlerFn<C> = Arc::new(move |params, ctx| handler(params, ctx).boxed());
        if self
            .routes
            .insert(name.clone(), Route { params, handler })
            .is_some()
        {
            debug!(method = %name, "Replaced existing handler");
        }
    }

    /// Builder form of [`Dispatcher::register`]
    pub fn with_method<F, Fut>(
        mut self,
        name: impl Into<String>,
        params: SharedValidator,
        handler: F,
    ) -> Self
    where
        F: Fn(Value, CallContext<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
    {
        self.register(name, params, handler);
        self
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Codec used for decoding and encoding
    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Handle one inbound text frame and return the frames to send back.
    ///
    /// Messages are handled in order. JSON-RPC responses to a batch are
    /// collected into one array frame; tagged replies are sent as separate
    /// frames. An empty vector means nothing is sent.
    pub async fn dispatch(&self, text: &str, context: C) -> Vec<String> {
        let frame = match self.codec.decode(text) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(error = %err, "Rejected unparseable frame");
                let flavor = self.codec.default_flavor();
                return self.encode_all(flavor, vec![Outgoing::error(flavor, None, &err)]);
            }
        };

        match frame {
            Frame::Single(decoded) => {
                let flavor = decoded.flavor;
                let out = self.dispatch_one(decoded, &context).await;
                self.encode_all(flavor, out)
            }
            Frame::Batch(items) if items.is_empty() => {
                let flavor = self.codec.default_flavor();
                let err = ProtocolError::InvalidRequest(ValidationError::expected(
                    "be a non-empty batch",
                ));
                self.encode_all(flavor, vec![Outgoing::error(flavor, None, &err)])
            }
            Frame::Batch(items) => self.dispatch_batch(items, &context).await,
        }
    }

    async fn dispatch_batch(&self, items: Vec<Decoded>, context: &C) -> Vec<String> {
        debug!(size = items.len(), "Dispatching batch");
        let mut frames = Vec::new();
        let mut responses = Vec::new();

        for decoded in items {
            let flavor = decoded.flavor;
            for out in self.dispatch_one(decoded, context).await {
                match out {
                    Outgoing::Success { .. } | Outgoing::Failure { .. } => responses.push(out),
                    other => frames.extend(self.encode_all(flavor, vec![other])),
                }
            }
        }

        if !responses.is_empty() {
            frames.extend(self.encode_all(Flavor::JsonRpc, vec![Outgoing::Batch(responses)]));
        }
        frames
    }

    async fn dispatch_one(&self, decoded: Decoded, context: &C) -> Vec<Outgoing> {
        let Decoded {
            flavor,
            id,
            envelope,
        } = decoded;

        let envelope = match envelope {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(%flavor, error = %err, "Rejected malformed message");
                return vec![Outgoing::error(flavor, id, &err)];
            }
        };

        match self.invoke(&envelope, context).await {
            Ok(reply) => Self::reply_messages(&envelope, reply),
            Err(err) => match envelope {
                Envelope::Notification { ref method, .. } => {
                    debug!(method = %method, error = %err, "Dropped error for notification");
                    Vec::new()
                }
                _ => vec![Outgoing::error(flavor, envelope.id().cloned(), &err)],
            },
        }
    }

    async fn invoke(&self, envelope: &Envelope, context: &C) -> Result<Reply, ProtocolError> {
        let method = envelope.name();
        let route = self
            .routes
            .get(method)
            .ok_or_else(|| ProtocolError::method_not_found(method))?;

        let raw = envelope
            .params()
            .filter(|p| !p.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let params = route
            .params
            .validate(&raw)
            .map_err(|e| ProtocolError::InvalidParams(e.within_field(envelope.params_field())))?;

        debug!(method, flavor = %envelope.flavor(), "Invoking handler");

        let handler = Arc::clone(&route.handler);
        let call = CallContext {
            context: context.clone(),
            flavor: envelope.flavor(),
            method: method.to_string(),
        };
        let outcome = AssertUnwindSafe(async move { handler(params, call).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => {
                error!(method, error = %err, "Handler failed");
                Err(ProtocolError::internal(err.to_string()))
            }
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                error!(method, panic = %detail, "Handler panicked");
                Err(ProtocolError::internal(format!("handler panicked: {detail}")))
            }
        }
    }

    fn reply_messages(envelope: &Envelope, reply: Reply) -> Vec<Outgoing> {
        match envelope {
            Envelope::Tagged { .. } => match reply {
                Reply::Empty => Vec::new(),
                Reply::Message { kind, payload } => vec![Outgoing::message(kind, payload)],
                Reply::Messages { kind, items } => items
                    .into_iter()
                    .map(|item| Outgoing::message(kind.clone(), item))
                    .collect(),
            },
            Envelope::Request { id, .. } => {
                let result = match reply {
                    Reply::Empty => Value::Null,
                    Reply::Message { payload, .. } => payload,
                    Reply::Messages { items, .. } => Value::Array(items),
                };
                vec![Outgoing::Success {
                    id: id.clone(),
                    result,
                }]
            }
            Envelope::Notification { .. } => Vec::new(),
        }
    }

    fn encode_all(&self, flavor: Flavor, messages: Vec<Outgoing>) -> Vec<String> {
        messages
            .into_iter()
            .filter_map(|message| self.encode_or_internal(flavor, &message))
            .collect()
    }

    fn encode_or_internal(&self, flavor: Flavor, message: &Outgoing) -> Option<String> {
        match self.codec.encode(message) {
            Ok(text) => Some(text),
            Err(err) => {
                error!(error = %err, "Failed to encode outgoing message");
                let id = match message {
                    Outgoing::Success { id, .. } | Outgoing::Failure { id, .. } => Some(id.clone()),
                    _ => None::<RequestId>,
                };
                let fallback =
                    Outgoing::error(flavor, id, &ProtocolError::internal(err.to_string()));
                match self.codec.encode(&fallback) {
                    Ok(text) => Some(text),
                    Err(err) => {
                        warn!(error = %err, "Dropped message that could not be encoded");
                        None
                    }
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
