//! Command line interface

use std::net::SocketAddr;
use std::path::PathBuf;

use brs_core::{Flavor, ServerConfig};
use clap::{Parser, ValueEnum};

/// Stream battle results to websocket subscribers.
///
/// Host events are read from stdin, one JSON object per line:
/// `{"event":"ready"}`, `{"event":"unavailable"}` or
/// `{"event":"result","id":N,"result":...}`.
#[derive(Debug, Parser)]
#[command(name = "brs-server", version, about)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Listen address (overrides the configuration file)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    /// Allowed handshake origin pattern; repeat to allow several
    #[arg(long = "allow-origin", value_name = "REGEX")]
    pub allow_origins: Vec<String>,

    /// Wire flavor used when a frame's flavor cannot be detected
    #[arg(long, value_enum)]
    pub protocol: Option<Protocol>,

    /// Send the list of commands to every new connection
    #[arg(long)]
    pub announce_commands: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, value_name = "FILTER", default_value = "info")]
    pub log_level: String,
}

/// Wire flavor selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Protocol {
    /// `{"type": ..., "payload": ...}`
    Tagged,
    /// JSON-RPC 2.0
    JsonRpc,
}

impl From<Protocol> for Flavor {
    fn from(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Tagged => Flavor::Tagged,
            Protocol::JsonRpc => Flavor::JsonRpc,
        }
    }
}

impl Cli {
    /// Build the effective configuration: file (or defaults), then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the result does not
    /// validate.
    pub fn load_config(&self) -> brs_core::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if !self.allow_origins.is_empty() {
            config.allowed_origins = self.allow_origins.clone();
        }
        if let Some(protocol) = self.protocol {
            config.default_flavor = protocol.into();
        }
        if self.announce_commands {
            config.announce_commands = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_flags() {
        let cli = Cli::parse_from(["brs-server"]);
        let config = cli.load_config().unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "brs-server",
            "--bind",
            "0.0.0.0:9000",
            "--allow-origin",
            "^https://a\\.example$",
            "--allow-origin",
            "^https://b\\.example$",
            "--protocol",
            "json-rpc",
            "--announce-commands",
        ]);
        let config = cli.load_config().unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.allowed_origins.len(), 2);
        assert_eq!(config.default_flavor, Flavor::JsonRpc);
        assert!(config.announce_commands);
    }

    #[test]
    fn test_invalid_origin_is_rejected() {
        let cli = Cli::parse_from(["brs-server", "--allow-origin", "("]);
        assert!(matches!(cli.load_config(), Err(brs_core::Error::Config(_))));
    }
}
