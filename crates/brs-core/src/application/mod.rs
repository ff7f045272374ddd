//! Application layer: dispatching, commands and services

pub mod commands;
pub mod dispatcher;
pub mod ports;
pub mod services;

pub use dispatcher::{CallContext, Dispatcher, HandlerError, Reply};
pub use ports::{Connection, ConnectionId, MessageSink, TransportError};
