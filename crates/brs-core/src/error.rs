//! Error types for BRS operations

use crate::application::TransportError;
use crate::application::services::FetchError;
use crate::protocol::ProtocolError;

/// Result type alias for BRS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for BRS operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Wire protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Delivery to a peer failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Upstream fetch failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(ProtocolError::parse(&err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::config("bad origin").to_string(),
            "Configuration error: bad origin"
        );
        assert_eq!(
            Error::from(FetchError::Abandoned).to_string(),
            "Fetch error: upstream dropped the request without answering"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken");
        assert!(matches!(Error::from(io), Error::Io(msg) if msg == "taken"));
    }
}
