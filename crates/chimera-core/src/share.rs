//! The share record persisted by the batch writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One submitted proof-of-work attempt.
///
/// Produced by the ingestion layer after validation; the writer does not
/// check identifiers or difficulty. A `None` timestamp is filled with the
/// persistence time when the share's batch is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub miner_id: i64,
    pub user_id: i64,
    pub difficulty: f64,
    pub is_valid: bool,
    pub nonce: String,
    pub hash: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Share {
    /// Build a share without a timestamp.
    pub fn new(
        miner_id: i64,
        user_id: i64,
        difficulty: f64,
        is_valid: bool,
        nonce: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            miner_id,
            user_id,
            difficulty,
            is_valid,
            nonce: nonce.into(),
            hash: hash.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// The timestamp to persist: the share's own, or `now` when unset.
    pub fn timestamp_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.timestamp.unwrap_or(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn unset_timestamp_takes_persistence_time() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let share = Share::new(1, 2, 16.0, true, "n", "h");
        assert_eq!(share.timestamp_or(now), now);
    }

    #[test]
    fn explicit_timestamp_is_kept() {
        let submitted = Utc.with_ymd_and_hms(2024, 5, 1, 11, 59, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let share = Share::new(1, 2, 16.0, true, "n", "h").with_timestamp(submitted);
        assert_eq!(share.timestamp_or(now), submitted);
    }
}
