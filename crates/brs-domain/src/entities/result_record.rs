//! Result record entity stored by the replay log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Point in time a record was stored, as seconds since the Unix epoch.
///
/// Replay queries compare against plain JSON numbers sent by clients, so the
/// wire representation is a floating point second count rather than an
/// RFC 3339 string.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Unix epoch (`0`)
    pub const EPOCH: Self = Self(0.0);

    /// Create a timestamp from seconds since the Unix epoch
    #[must_use]
    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Seconds since the Unix epoch
    #[must_use]
    pub fn as_secs(self) -> f64 {
        self.0
    }

    /// Whether this timestamp is strictly later than `other`
    #[must_use]
    pub fn is_after(self, other: Self) -> bool {
        self.0 > other.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at.timestamp_micros() as f64 / 1_000_000.0)
    }
}

/// A fetched result, stamped when it arrived.
///
/// Records are created once and never mutated; the log only ever appends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "recordedAt")]
    recorded_at: Timestamp,
    #[serde(rename = "result")]
    payload: Value,
}

impl ResultRecord {
    /// Create a record stamped with `recorded_at`
    #[must_use]
    pub fn new(recorded_at: Timestamp, payload: Value) -> Self {
        Self {
            recorded_at,
            payload,
        }
    }

    /// Arrival time
    #[must_use]
    pub fn recorded_at(&self) -> Timestamp {
        self.recorded_at
    }

    /// Result payload as received from the host
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Wire form: `{"result": <payload>, "recordedAt": <secs>}`
    #[must_use]
    pub fn to_wire(&self) -> Value {
        json!({
            "result": self.payload,
            "recordedAt": self.recorded_at.as_secs(),
        })
    }
}
