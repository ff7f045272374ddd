//! Result fetcher
//!
//! Turns host notifications ("result `id` is available") into upstream
//! fetches through the single-flight queue and records successful results
//! in the [`ResultLog`]. Ids are fetched one at a time in host arrival
//! order; while the upstream is unavailable they stay queued and no new
//! fetch is started.

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::result_log::ResultLog;
use super::single_flight::{SingleFlight, UpstreamFetch};

/// Notification from the host application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A result with this id can be fetched
    ResultAvailable {
        /// Host-side result id
        id: i64,
    },
    /// The upstream accepts fetches
    UpstreamReady,
    /// No new fetch is started until the next `UpstreamReady`
    UpstreamUnavailable,
}

/// Drives fetches from host events
pub struct ResultFetcher<U> {
    flight: Arc<SingleFlight<U>>,
    log: Arc<ResultLog>,
    pending: VecDeque<i64>,
    available: bool,
    // holds at most one fetch
    in_flight: JoinSet<()>,
}

impl<U> ResultFetcher<U>
where
    U: UpstreamFetch<Arg = i64, Output = Value>,
{
    /// Create a fetcher; the upstream starts out unavailable
    pub fn new(flight: Arc<SingleFlight<U>>, log: Arc<ResultLog>) -> Self {
        Self {
            flight,
            log,
            pending: VecDeque::new(),
            available: false,
            in_flight: JoinSet::new(),
        }
    }

    /// Ids waiting to be fetched
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Whether queued ids may be fetched
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Process events until the channel closes.
    ///
    /// After the channel closes, queued ids are still fetched while the
    /// upstream stays available.
    pub async fn run(mut self, mut events: mpsc::Receiver<HostEvent>) {
        info!("Result fetcher started");
        let mut open = true;
        loop {
            self.start_next();
            if !open && self.in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                event = events.recv(), if open => match event {
                    Some(event) => self.handle(event),
                    None => open = false,
                },
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(err) = joined {
                        error!(error = %err, "Fetch task failed");
                    }
                }
            }
        }

        if !self.pending.is_empty() {
            warn!(pending = self.pending.len(), "Result fetcher stopped with unfetched ids");
        }
        info!("Result fetcher stopped");
    }

    /// Apply one host event
    pub fn handle(&mut self, event: HostEvent) {
        match event {
            HostEvent::ResultAvailable { id } if id <= 0 => {
                debug!(id, "Skipped result without a valid id");
            }
            HostEvent::ResultAvailable { id } => {
                debug!(id, available = self.available, "Queued result");
                self.pending.push_back(id);
            }
            HostEvent::UpstreamReady => {
                self.available = true;
                info!(queued = self.pending.len(), "Upstream ready");
            }
            HostEvent::UpstreamUnavailable => {
                self.available = false;
                info!(queued = self.pending.len(), "Upstream unavailable");
            }
        }
    }

    fn start_next(&mut self) {
        if !self.available || !self.in_flight.is_empty() {
            return;
        }
        let Some(id) = self.pending.pop_front() else {
            return;
        };

        let flight = Arc::clone(&self.flight);
        let log = Arc::clone(&self.log);
        self.in_flight.spawn(async move {
            match flight.call(id).await {
                Ok(result) => {
                    let record = log.append(result);
                    info!(id, recorded_at = record.recorded_at().as_secs(), "Recorded result");
                }
                Err(err) => warn!(id, error = %err, "Failed to fetch result"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::single_flight::{Completion, FetchError};
    use crate::protocol::Codec;
    use serde_json::json;

    struct Immediate;

    impl UpstreamFetch for Immediate {
        type Arg = i64;
        type Output = Value;

        fn fetch(&self, id: i64, done: Completion<Value>) {
            if id == 13 {
                done.fail(FetchError::upstream("unlucky"));
            } else {
                done.succeed(json!({"id": id}));
            }
        }
    }

    fn fetcher() -> (ResultFetcher<Immediate>, Arc<ResultLog>) {
        let log = Arc::new(ResultLog::with_system_clock(Codec::default()));
        let flight = Arc::new(SingleFlight::new(Immediate));
        (ResultFetcher::new(flight, Arc::clone(&log)), log)
    }

    #[tokio::test]
    async fn test_queues_until_ready() {
        let (mut fetcher, log) = fetcher();
        fetcher.handle(HostEvent::ResultAvailable { id: 1 });
        fetcher.handle(HostEvent::ResultAvailable { id: 2 });
        assert_eq!(fetcher.pending(), 2);
        assert!(log.is_empty());

        let (tx, rx) = mpsc::channel(4);
        tx.send(HostEvent::UpstreamReady).await.unwrap();
        drop(tx);
        fetcher.run(rx).await;

        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_skips_non_positive_ids() {
        let (mut fetcher, _log) = fetcher();
        fetcher.handle(HostEvent::ResultAvailable { id: 0 });
        fetcher.handle(HostEvent::ResultAvailable { id: -4 });
        assert_eq!(fetcher.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_records_nothing() {
        let (fetcher, log) = fetcher();
        let (tx, rx) = mpsc::channel(4);
        tx.send(HostEvent::UpstreamReady).await.unwrap();
        tx.send(HostEvent::ResultAvailable { id: 13 }).await.unwrap();
        tx.send(HostEvent::ResultAvailable { id: 14 }).await.unwrap();
        drop(tx);
        fetcher.run(rx).await;

        let records = log.replay(brs_domain::Timestamp::EPOCH);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload(), &json!({"id": 14}));
    }

    #[tokio::test]
    async fn test_ready_does_not_fetch_outside_run() {
        let (mut fetcher, log) = fetcher();
        fetcher.handle(HostEvent::UpstreamReady);
        fetcher.handle(HostEvent::ResultAvailable { id: 5 });
        fetcher.handle(HostEvent::ResultAvailable { id: 9 });
        assert_eq!(fetcher.pending(), 2);
        assert!(log.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_records_follow_host_order() {
        let (fetcher, log) = fetcher();
        let (tx, rx) = mpsc::channel(64);
        let running = tokio::spawn(fetcher.run(rx));

        tx.send(HostEvent::UpstreamReady).await.unwrap();
        for id in 20..60 {
            tx.send(HostEvent::ResultAvailable { id }).await.unwrap();
        }
        drop(tx);
        running.await.unwrap();

        let ids: Vec<i64> = log
            .replay(brs_domain::Timestamp::EPOCH)
            .iter()
            .filter_map(|record| record.payload()["id"].as_i64())
            .collect();
        assert_eq!(ids, (20..60).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_unavailable_requeues() {
        let (mut fetcher, _log) = fetcher();
        fetcher.handle(HostEvent::UpstreamReady);
        fetcher.handle(HostEvent::UpstreamUnavailable);
        fetcher.handle(HostEvent::ResultAvailable { id: 3 });
        assert!(!fetcher.is_available());
        assert_eq!(fetcher.pending(), 1);
    }
}
