//! Protocol orchestrator
//!
//! Owns the result log and the dispatcher and exposes the three transport
//! events: connect, inbound frame, disconnect.

use std::sync::Arc;

use brs_domain::ValidationError;
use serde_json::json;
use tracing::{error, info, warn};

use super::result_log::ResultLog;
use crate::application::commands::register_commands;
use crate::application::dispatcher::Dispatcher;
use crate::application::ports::Connection;
use crate::protocol::{Codec, Flavor, Outgoing, ProtocolError};

/// Tagged message type announcing the registered commands
pub const COMMANDS_MESSAGE_TYPE: &str = "COMMANDS";

/// Service wiring the dispatcher and result log to connections
pub struct ResultStreamService {
    log: Arc<ResultLog>,
    dispatcher: Dispatcher<Connection>,
    announce_commands: bool,
}

impl ResultStreamService {
    /// Create a service over `log` with all subscription commands registered
    pub fn new(log: Arc<ResultLog>, codec: Codec) -> Self {
        let mut dispatcher = Dispatcher::new(codec);
        register_commands(&mut dispatcher, &log);
        Self {
            log,
            dispatcher,
            announce_commands: false,
        }
    }

    /// Send a `COMMANDS` message to every new connection
    pub fn with_command_announcement(mut self, enabled: bool) -> Self {
        self.announce_commands = enabled;
        self
    }

    /// Result log
    pub fn log(&self) -> &Arc<ResultLog> {
        &self.log
    }

    /// Dispatcher, for registering extra methods before serving
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<Connection> {
        &mut self.dispatcher
    }

    /// Frames to send when `connection` is established
    pub fn on_connect(&self, connection: &Connection) -> Vec<String> {
        info!(connection = %connection.id(), "Connection established");
        if !self.announce_commands || self.dispatcher.codec().default_flavor() != Flavor::Tagged {
            return Vec::new();
        }

        let announcement = Outgoing::message(
            COMMANDS_MESSAGE_TYPE,
            json!({ "commandTypes": self.dispatcher.methods() }),
        );
        match self.dispatcher.codec().encode(&announcement) {
            Ok(text) => vec![text],
            Err(err) => {
                error!(error = %err, "Failed to encode command announcement");
                Vec::new()
            }
        }
    }

    /// Handle one inbound text frame from `connection`
    pub async fn on_message(&self, connection: &Connection, text: &str) -> Vec<String> {
        self.dispatcher.dispatch(text, connection.clone()).await
    }

    /// Error frame for an inbound frame above the size limit
    pub fn on_oversized_message(
        &self,
        connection: &Connection,
        size: usize,
        limit: usize,
    ) -> Vec<String> {
        warn!(connection = %connection.id(), size, limit, "Rejected oversized frame");
        let flavor = self.dispatcher.codec().default_flavor();
        let err = ProtocolError::InvalidRequest(ValidationError::new(format!(
            "Expected {{context}} to be at most {limit} bytes."
        )));
        match self.dispatcher.codec().encode(&Outgoing::error(flavor, None, &err)) {
            Ok(text) => vec![text],
            Err(err) => {
                error!(error = %err, "Failed to encode size limit error");
                Vec::new()
            }
        }
    }

    /// Forget `connection`; safe whether or not it ever subscribed
    pub fn on_disconnect(&self, connection: &Connection) {
        self.log.unsubscribe(connection.id());
        info!(connection = %connection.id(), "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn service() -> ResultStreamService {
        ResultStreamService::new(
            Arc::new(ResultLog::with_system_clock(Codec::default())),
            Codec::default(),
        )
    }

    #[tokio::test]
    async fn test_disconnect_unsubscribes() {
        let service = service();
        let (conn, _rx) = Connection::channel();
        service.on_message(&conn, r#"{"type":"SUBSCRIBE"}"#).await;
        assert!(service.log().is_subscribed(conn.id()));
        service.on_disconnect(&conn);
        assert!(!service.log().is_subscribed(conn.id()));
    }

    #[tokio::test]
    async fn test_disconnect_without_subscription_is_noop() {
        let service = service();
        let (conn, _rx) = Connection::channel();
        service.on_disconnect(&conn);
        assert_eq!(service.log().subscriber_count(), 0);
    }

    #[test]
    fn test_announcement_lists_commands() {
        let service = service().with_command_announcement(true);
        let (conn, _rx) = Connection::channel();
        let frames = service.on_connect(&conn);
        let value: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(value["type"], "COMMANDS");
        let names = value["payload"]["commandTypes"].as_array().unwrap();
        assert!(names.contains(&Value::from("REPLAY_AND_SUBSCRIBE")));
    }

    #[test]
    fn test_oversized_frame_is_invalid_request() {
        let (conn, _rx) = Connection::channel();
        let frames = service().on_oversized_message(&conn, 2048, 1024);
        let value: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(value["payload"]["type"], "MALFORMED_MESSAGE");
        assert_eq!(value["payload"]["message"], "Expected $ to be at most 1024 bytes.");
    }

    #[test]
    fn test_no_announcement_by_default() {
        let (conn, _rx) = Connection::channel();
        assert!(service().on_connect(&conn).is_empty());
    }
}
