//! Server configuration
//!
//! Loaded from a JSON file; every field has a default so partial files work.

use std::net::SocketAddr;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::Flavor;

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:61942";

/// Default maximum inbound frame size (1 MiB)
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Websocket server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
    /// Regular expressions matched against the handshake `Origin` header
    pub allowed_origins: Vec<String>,
    /// Flavor used when a frame's flavor cannot be detected
    pub default_flavor: Flavor,
    /// Send the registered command names on connect
    pub announce_commands: bool,
    /// Largest accepted inbound frame in bytes
    pub max_message_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 61942)),
            allowed_origins: vec![
                r"^https?://localhost(:[0-9]{1,5})?$".to_string(),
                r"^https://lgfrbcsgo\.github\.io$".to_string(),
            ],
            default_flavor: Flavor::Tagged,
            announce_commands: false,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl ServerConfig {
    /// Read a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
    /// if it is not valid JSON for this structure.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text does not describe a configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::config(format!("invalid config: {e}")))
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unparseable origin pattern or a zero
    /// frame size limit.
    pub fn validate(&self) -> Result<()> {
        if self.max_message_bytes == 0 {
            return Err(Error::config("max_message_bytes must be greater than zero"));
        }
        self.origin_patterns().map(|_| ())
    }

    /// Compile the origin allowlist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid pattern.
    pub fn origin_patterns(&self) -> Result<Vec<Regex>> {
        self.allowed_origins
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| Error::config(format!("invalid origin pattern {pattern:?}: {e}")))
            })
            .collect()
    }
}
