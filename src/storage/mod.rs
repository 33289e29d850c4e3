//! Status record storage
//!
//! The append-only collection of per-tank status records, queried by tank and
//! timestamp. Backends implement [`StatusStore`] so reports and the API never
//! depend on a concrete database:
//! - `InMemoryStore`: tests and throwaway deployments
//! - `SledStatusStore`: embedded, durable, indexed by (tank, timestamp)

pub mod backup;
mod memory;
mod sled_store;

pub use backup::{import_records, read_backup, write_backup, ImportSummary};
pub use memory::InMemoryStore;
pub use sled_store::SledStatusStore;

use async_trait::async_trait;

use crate::types::{NewStatus, StatusRecord, TankId, Timestamp};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("record for tank {tank_id} at {timestamp} already exists")]
    Duplicate { tank_id: TankId, timestamp: Timestamp },
    #[error("backup I/O error: {0}")]
    Io(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Trait for pluggable status record backends
///
/// Implementations must be thread-safe (Send + Sync); per-tank queries are
/// issued concurrently by report assembly.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Append a record with an already-assigned timestamp.
    ///
    /// Fails with [`StoreError::Duplicate`] when the tank already has a record
    /// at exactly that instant.
    async fn append(&self, record: StatusRecord) -> Result<(), StoreError>;

    /// Assign a server timestamp and append.
    ///
    /// Assigned timestamps are strictly increasing for the lifetime of the
    /// store, even when the wall clock stalls or steps back.
    async fn submit(&self, status: NewStatus) -> Result<StatusRecord, StoreError>;

    /// Latest record for `tank_id` with timestamp `<= at`, or the latest
    /// overall when `at` is `None`.
    async fn latest_at_or_before(
        &self,
        tank_id: &TankId,
        at: Option<Timestamp>,
    ) -> Result<Option<StatusRecord>, StoreError>;

    /// Records for `tank_id` with `from <= timestamp <= to`, ascending.
    async fn range(
        &self,
        tank_id: &TankId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<StatusRecord>, StoreError>;

    /// Every record of every tank, ascending by timestamp.
    async fn all_records(&self) -> Result<Vec<StatusRecord>, StoreError>;

    /// Total number of stored records.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;

    /// Make every acknowledged write durable. No-op for volatile backends.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Next server timestamp: `now`, bumped past `last` when the clock has not
/// advanced.
pub(crate) fn next_server_timestamp(last: Option<Timestamp>, now: Timestamp) -> Timestamp {
    match last {
        Some(last) if now <= last => last.succ(),
        _ => now,
    }
}

/// Stable order for multi-tank listings: timestamp, then tank.
pub(crate) fn sort_chronologically(records: &mut [StatusRecord]) {
    records.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.tank_id.cmp(&b.tank_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_server_timestamp_is_strictly_increasing() {
        let now = Timestamp::new(100, 0);
        assert_eq!(next_server_timestamp(None, now), now);
        assert_eq!(next_server_timestamp(Some(Timestamp::new(99, 0)), now), now);
        assert_eq!(next_server_timestamp(Some(now), now), Timestamp::new(100, 1));
        assert_eq!(
            next_server_timestamp(Some(Timestamp::new(150, 0)), now),
            Timestamp::new(150, 1)
        );
    }
}
