//! Host bridge over stdin
//!
//! The host announces results by writing them to stdin. Each result is
//! staged in [`StagedUpstream`] and only its id is forwarded to the fetcher,
//! which then pulls it back out through the single-flight queue.

use std::collections::HashMap;
use std::sync::Arc;

use brs_core::{Completion, FetchError, HostEvent, UpstreamFetch};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Upstream answering fetches from results staged by the host
#[derive(Debug, Clone, Default)]
pub struct StagedUpstream {
    staged: Arc<Mutex<HashMap<i64, Value>>>,
}

impl StagedUpstream {
    /// Make `result` available under `id`
    pub fn stage(&self, id: i64, result: Value) {
        self.staged.lock().insert(id, result);
    }

    /// Number of results not fetched yet
    pub fn staged(&self) -> usize {
        self.staged.lock().len()
    }
}

impl UpstreamFetch for StagedUpstream {
    type Arg = i64;
    type Output = Value;

    fn fetch(&self, id: i64, done: Completion<Value>) {
        match self.staged.lock().remove(&id) {
            Some(result) => done.succeed(result),
            None => done.fail(FetchError::upstream(format!("no result staged for id {id}"))),
        }
    }
}

/// One line of host input
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostLine {
    /// Upstream accepts fetches
    Ready,
    /// Upstream must not be called
    Unavailable,
    /// A finished result
    Result {
        /// Host-side id
        id: i64,
        /// Result payload
        #[serde(default)]
        result: Value,
    },
}

impl HostLine {
    /// Parse one line of host input
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Forward host lines from `reader` to the fetcher until input ends or the
/// fetcher goes away.
///
/// # Errors
///
/// Returns [`brs_core::Error::Io`] if reading fails.
pub async fn run_host_bridge<R>(
    reader: R,
    upstream: StagedUpstream,
    events: mpsc::Sender<HostEvent>,
) -> brs_core::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = match HostLine::parse(line) {
            Ok(HostLine::Ready) => HostEvent::UpstreamReady,
            Ok(HostLine::Unavailable) => HostEvent::UpstreamUnavailable,
            Ok(HostLine::Result { id, result }) => {
                if id > 0 {
                    upstream.stage(id, result);
                }
                debug!(id, "Host reported result");
                HostEvent::ResultAvailable { id }
            }
            Err(err) => {
                warn!(error = %err, "Ignored malformed host line");
                continue;
            }
        };

        if events.send(event).await.is_err() {
            warn!("Result fetcher stopped, closing host bridge");
            break;
        }
    }
    info!("Host input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use brs_core::SingleFlight;
    use serde_json::json;

    #[test]
    fn test_parse_lines() {
        assert_eq!(HostLine::parse(r#"{"event":"ready"}"#).unwrap(), HostLine::Ready);
        assert_eq!(
            HostLine::parse(r#"{"event":"unavailable"}"#).unwrap(),
            HostLine::Unavailable
        );
        assert_eq!(
            HostLine::parse(r#"{"event":"result","id":4,"result":{"w":1}}"#).unwrap(),
            HostLine::Result {
                id: 4,
                result: json!({"w": 1})
            }
        );
        assert!(HostLine::parse(r#"{"event":"bogus"}"#).is_err());
    }

    #[tokio::test]
    async fn test_staged_upstream_answers_once() {
        let upstream = StagedUpstream::default();
        upstream.stage(1, json!("r"));
        let flight = SingleFlight::new(upstream.clone());

        assert_eq!(flight.call(1).await, Ok(json!("r")));
        assert!(matches!(flight.call(1).await, Err(FetchError::Upstream(_))));
        assert_eq!(upstream.staged(), 0);
    }

    #[tokio::test]
    async fn test_bridge_forwards_events() {
        let input: &[u8] = concat!(
            "{\"event\":\"ready\"}\n",
            "\n",
            "not json\n",
            "{\"event\":\"result\",\"id\":2,\"result\":7}\n",
        )
        .as_bytes();
        let upstream = StagedUpstream::default();
        let (tx, mut rx) = mpsc::channel(8);

        run_host_bridge(input, upstream.clone(), tx).await.unwrap();

        assert_eq!(rx.recv().await, Some(HostEvent::UpstreamReady));
        assert_eq!(rx.recv().await, Some(HostEvent::ResultAvailable { id: 2 }));
        assert_eq!(rx.recv().await, None);
        assert_eq!(upstream.staged(), 1);
    }

    #[tokio::test]
    async fn test_bridge_handles_split_reads() {
        let reader = tokio_test::io::Builder::new()
            .read(b"{\"event\":\"unava")
            .read(b"ilable\"}\n{\"event\":\"result\",\"id\":0}\n")
            .build();
        let upstream = StagedUpstream::default();
        let (tx, mut rx) = mpsc::channel(8);

        run_host_bridge(tokio::io::BufReader::new(reader), upstream.clone(), tx)
            .await
            .unwrap();

        assert_eq!(rx.recv().await, Some(HostEvent::UpstreamUnavailable));
        assert_eq!(rx.recv().await, Some(HostEvent::ResultAvailable { id: 0 }));
        assert_eq!(upstream.staged(), 0);
    }
}
