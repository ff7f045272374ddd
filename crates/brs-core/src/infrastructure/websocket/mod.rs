//! WebSocket transport for result streaming
//!
//! Browsers may only connect from allowlisted origins; clients that send no
//! `Origin` header (native tools) are always accepted.

use regex::Regex;

#[cfg(feature = "websocket-server")]
pub mod server;

#[cfg(feature = "websocket-server")]
pub use server::WebSocketServer;

/// Handshake origin allowlist
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    patterns: Vec<Regex>,
}

impl OriginPolicy {
    /// Policy accepting origins that match any of `patterns`
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// Policy accepting every origin
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Whether a handshake with this `Origin` header value may proceed
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(_) if self.patterns.is_empty() => true,
            Some(origin) => self.patterns.iter().any(|p| p.is_match(origin)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[test]
    fn test_missing_origin_is_allowed() {
        let policy = OriginPolicy::new(ServerConfig::default().origin_patterns().unwrap());
        assert!(policy.allows(None));
    }

    #[test]
    fn test_origin_must_match_a_pattern() {
        let policy = OriginPolicy::new(ServerConfig::default().origin_patterns().unwrap());
        assert!(policy.allows(Some("http://localhost:3000")));
        assert!(!policy.allows(Some("http://example.com")));
    }

    #[test]
    fn test_empty_policy_allows_everything() {
        assert!(OriginPolicy::allow_all().allows(Some("http://example.com")));
    }
}
