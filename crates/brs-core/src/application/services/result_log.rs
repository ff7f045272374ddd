//! Replayable result log with live fan-out
//!
//! Every appended record is stamped, stored forever and pushed to all
//! subscribed connections in their own wire flavor. Replays return records
//! strictly newer than a given timestamp, in insertion order.

use std::collections::HashMap;
use std::sync::Arc;

use brs_domain::{ResultRecord, Timestamp};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::application::ports::{Connection, ConnectionId, MessageSink};
use crate::protocol::{Codec, Flavor, record_message};

/// Source of arrival timestamps
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> Timestamp;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from(Utc::now())
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: Mutex<f64>,
}

impl ManualClock {
    /// Create a clock reading `secs`
    pub fn new(secs: f64) -> Self {
        Self {
            secs: Mutex::new(secs),
        }
    }

    /// Jump to `secs`
    pub fn set(&self, secs: f64) {
        *self.secs.lock() = secs;
    }

    /// Move forward by `secs`
    pub fn advance(&self, secs: f64) {
        *self.secs.lock() += secs;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(*self.secs.lock())
    }
}

struct Subscriber {
    sink: Arc<dyn MessageSink>,
    flavor: Flavor,
}

/// Append-only result store with subscribers
pub struct ResultLog {
    clock: Arc<dyn Clock>,
    codec: Codec,
    records: RwLock<Vec<ResultRecord>>,
    subscribers: Mutex<HashMap<ConnectionId, Subscriber>>,
}

impl ResultLog {
    /// Create an empty log
    pub fn new(clock: Arc<dyn Clock>, codec: Codec) -> Self {
        Self {
            clock,
            codec,
            records: RwLock::new(Vec::new()),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Create an empty log stamped by the wall clock
    pub fn with_system_clock(codec: Codec) -> Self {
        Self::new(Arc::new(SystemClock), codec)
    }

    /// Stamp, store and broadcast a result.
    ///
    /// Delivery failures are logged per subscriber and never abort the
    /// broadcast. The stored record is returned.
    pub fn append(&self, payload: Value) -> ResultRecord {
        let mut records = self.records.write();
        let record = ResultRecord::new(self.clock.now(), payload);
        records.push(record.clone());

        let subscribers = self.subscribers.lock();
        debug!(
            recorded_at = record.recorded_at().as_secs(),
            subscribers = subscribers.len(),
            "Appended result"
        );
        for (id, subscriber) in subscribers.iter() {
            self.deliver(*id, subscriber.sink.as_ref(), subscriber.flavor, &record);
        }
        record
    }

    /// Add `connection` to the broadcast set.
    ///
    /// Returns `false` if it was already subscribed; the stored flavor is
    /// updated either way.
    pub fn subscribe(&self, connection: &Connection, flavor: Flavor) -> bool {
        let added = self
            .subscribers
            .lock()
            .insert(
                connection.id(),
                Subscriber {
                    sink: connection.sink(),
                    flavor,
                },
            )
            .is_none();
        debug!(connection = %connection.id(), added, "Subscribed");
        added
    }

    /// Remove a connection from the broadcast set; a no-op if absent
    pub fn unsubscribe(&self, id: ConnectionId) -> bool {
        let removed = self.subscribers.lock().remove(&id).is_some();
        if removed {
            debug!(connection = %id, "Unsubscribed");
        }
        removed
    }

    /// Whether `id` currently receives broadcasts
    pub fn is_subscribed(&self, id: ConnectionId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    /// Records stored strictly after `after`, in insertion order
    pub fn replay(&self, after: Timestamp) -> Vec<ResultRecord> {
        self.records
            .read()
            .iter()
            .filter(|record| record.recorded_at().is_after(after))
            .cloned()
            .collect()
    }

    /// Send the replay for `after` directly to `connection`, then subscribe it.
    ///
    /// Runs while appends are held off, so every record reaches the
    /// connection exactly once: either in the replay or as a broadcast that
    /// follows it. Returns the number of replayed records.
    pub fn replay_and_subscribe(
        &self,
        connection: &Connection,
        flavor: Flavor,
        after: Timestamp,
    ) -> usize {
        let records = self.records.read();
        let sink = connection.sink();
        let mut replayed = 0;
        for record in records.iter().filter(|r| r.recorded_at().is_after(after)) {
            self.deliver(connection.id(), sink.as_ref(), flavor, record);
            replayed += 1;
        }
        self.subscribe(connection, flavor);
        replayed
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no record was stored yet
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Number of subscribed connections
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn deliver(
        &self,
        id: ConnectionId,
        sink: &dyn MessageSink,
        flavor: Flavor,
        record: &ResultRecord,
    ) {
        let text = match self.codec.encode(&record_message(flavor, record)) {
            Ok(text) => text,
            Err(err) => {
                error!(connection = %id, error = %err, "Failed to encode result");
                return;
            }
        };
        if let Err(err) = sink.send_message(text) {
            warn!(connection = %id, error = %err, "Failed to deliver result");
        }
    }
}
