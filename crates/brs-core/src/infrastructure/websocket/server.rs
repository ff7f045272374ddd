//! WebSocket server implementation for Axum

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        ConnectInfo, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::{HeaderMap, StatusCode, header::ORIGIN},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::OriginPolicy;
use crate::application::Connection;
use crate::application::services::ResultStreamService;
use crate::config::ServerConfig;
use crate::error::Result;

#[derive(Clone)]
struct AppState {
    service: Arc<ResultStreamService>,
    origins: Arc<OriginPolicy>,
    max_message_bytes: usize,
}

/// Axum websocket front for a [`ResultStreamService`]
pub struct WebSocketServer {
    state: AppState,
}

impl WebSocketServer {
    /// Create a server for `service` using the origin and size settings of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if `config` does not validate.
    pub fn new(service: Arc<ResultStreamService>, config: &ServerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: AppState {
                service,
                origins: Arc::new(OriginPolicy::new(config.origin_patterns()?)),
                max_message_bytes: config.max_message_bytes,
            },
        })
    }

    /// Routes: websocket upgrade on `/` and `/ws`, status on `/health`
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(upgrade_handler))
            .route("/ws", get(upgrade_handler))
            .route("/health", get(health_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on `listener` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if accepting connections fails.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "WebSocket server listening");
        }
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;
        info!("WebSocket server stopped");
        Ok(())
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let log = state.service.log();
    Json(json!({
        "status": "ok",
        "records": log.len(),
        "subscribers": log.subscriber_count(),
    }))
}

async fn upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let origin = match headers.get(ORIGIN).map(|value| value.to_str()) {
        None => None,
        Some(Ok(origin)) => Some(origin.to_string()),
        Some(Err(_)) => {
            warn!(%peer, "Rejected handshake with unreadable origin");
            return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
        }
    };

    if !state.origins.allows(origin.as_deref()) {
        warn!(%peer, origin = ?origin, "Rejected handshake from disallowed origin");
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(state, socket, peer, origin))
}

async fn handle_socket(
    state: AppState,
    socket: WebSocket,
    peer: SocketAddr,
    origin: Option<String>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (connection, mut outbound) = Connection::channel();
    let service = &state.service;
    info!(
        connection = %connection.id(),
        %peer,
        origin = ?origin,
        "WebSocket connection established"
    );

    let mut open = true;
    for frame in service.on_connect(&connection) {
        if sender.send(Message::Text(frame.into())).await.is_err() {
            open = false;
            break;
        }
    }

    while open {
        tokio::select! {
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let size = text.as_str().len();
                    let replies = if size > state.max_message_bytes {
                        service.on_oversized_message(&connection, size, state.max_message_bytes)
                    } else {
                        service.on_message(&connection, text.as_str()).await
                    };
                    for reply in replies {
                        if let Err(err) = sender.send(Message::Text(reply.into())).await {
                            debug!(
                                connection = %connection.id(),
                                error = %err,
                                "Failed to send reply"
                            );
                            open = false;
                            break;
                        }
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(
                        connection = %connection.id(),
                        bytes = data.len(),
                        "Ignored binary frame"
                    );
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => open = false,
                Some(Err(err)) => {
                    debug!(connection = %connection.id(), error = %err, "WebSocket receive failed");
                    open = false;
                }
            },
            Some(frame) = outbound.recv() => {
                if let Err(err) = sender.send(Message::Text(frame.into())).await {
                    debug!(connection = %connection.id(), error = %err, "Failed to push result");
                    open = false;
                }
            }
        }
    }

    service.on_disconnect(&connection);
}
