//! # BRS Core
//!
//! Message protocol engine for streaming battle results to external
//! subscribers. A connection speaks either tagged `{"type", "payload"}`
//! messages or JSON-RPC 2.0 (including batches); both are validated with the
//! combinators from `brs-domain` on the way in and on the way out.
//!
//! Results reported by the host pass through a single-flight queue guarding
//! the non-reentrant upstream fetch, land in an append-only replay log and
//! are fanned out to every subscribed connection.

#![warn(rust_2018_idioms)]
#![warn(missing_docs)]

pub mod application;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod protocol;

pub use application::{
    CallContext, Connection, ConnectionId, Dispatcher, HandlerError, MessageSink, Reply,
    TransportError,
    commands::register_commands,
    services::{
        Clock, Completion, FetchError, HostEvent, ManualClock, ResultFetcher, ResultLog,
        ResultStreamService, SingleFlight, SystemClock, UpstreamFetch,
    },
};
pub use config::ServerConfig;
pub use error::{Error, Result};
pub use protocol::{
    Codec, Envelope, ErrorCode, Flavor, Frame, Outgoing, ProtocolError, RequestId,
};

#[cfg(feature = "websocket-server")]
pub use infrastructure::websocket::WebSocketServer;
pub use infrastructure::websocket::OriginPolicy;

pub use brs_domain::{ResultRecord, Timestamp};
