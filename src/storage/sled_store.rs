//! Sled-backed status store
//!
//! Key layout in the `tank_status` tree sorts by tank, then chronologically:
//!
//! ```text
//! tank_id bytes | 0x00 | seconds (sign-flipped, u64 BE) | nanoseconds (u32 BE)
//! ```
//!
//! Value: JSON-serialized [`StatusRecord`]. "Latest at or before T" is a
//! reverse range scan from the (tank, T) key, so it never touches other tanks.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::types::{NewStatus, StatusRecord, TankId, Timestamp};

use super::{next_server_timestamp, sort_chronologically, StatusStore, StoreError};

const RECORDS_TREE: &str = "tank_status";
const META_TREE: &str = "meta";
const LAST_ASSIGNED_KEY: &[u8] = b"last_assigned";

/// Byte separating the tank id from the timestamp suffix.
const SEPARATOR: u8 = 0x00;

/// Durable status store backed by sled
#[derive(Clone)]
pub struct SledStatusStore {
    db: Arc<sled::Db>,
    records: sled::Tree,
    meta: sled::Tree,
    last_assigned: Arc<Mutex<Option<Timestamp>>>,
}

fn sortable_seconds(seconds: i64) -> [u8; 8] {
    // Flip the sign bit so negative seconds sort before positive ones.
    ((seconds as u64) ^ (1 << 63)).to_be_bytes()
}

fn tank_prefix(tank_id: &TankId) -> Vec<u8> {
    let mut key = Vec::with_capacity(tank_id.as_str().len() + 1);
    key.extend_from_slice(tank_id.as_str().as_bytes());
    key.push(SEPARATOR);
    key
}

fn record_key(tank_id: &TankId, ts: &Timestamp) -> Vec<u8> {
    let mut key = tank_prefix(tank_id);
    key.extend_from_slice(&sortable_seconds(ts.seconds));
    key.extend_from_slice(&ts.nanoseconds.to_be_bytes());
    key
}

fn encode_timestamp(ts: &Timestamp) -> [u8; 12] {
    let mut bytes = [0u8; 12];
    bytes[..8].copy_from_slice(&sortable_seconds(ts.seconds));
    bytes[8..].copy_from_slice(&ts.nanoseconds.to_be_bytes());
    bytes
}

fn decode_timestamp(bytes: &[u8]) -> Option<Timestamp> {
    if bytes.len() != 12 {
        return None;
    }
    let mut secs = [0u8; 8];
    secs.copy_from_slice(&bytes[..8]);
    let mut nanos = [0u8; 4];
    nanos.copy_from_slice(&bytes[8..]);
    let seconds = (u64::from_be_bytes(secs) ^ (1 << 63)) as i64;
    Some(Timestamp::new(seconds, u32::from_be_bytes(nanos)))
}

impl SledStatusStore {
    /// Open or create the store at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;
        let store = Self::from_db(db)?;
        info!(path = ?path_ref, records = store.records.len(), "Status store opened");
        Ok(store)
    }

    /// Throwaway store that lives only as long as the process.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let records = db.open_tree(RECORDS_TREE)?;
        let meta = db.open_tree(META_TREE)?;
        let last_assigned = meta
            .get(LAST_ASSIGNED_KEY)?
            .and_then(|bytes| decode_timestamp(&bytes));
        Ok(Self {
            db: Arc::new(db),
            records,
            meta,
            last_assigned: Arc::new(Mutex::new(last_assigned)),
        })
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Database size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.db.size_on_disk().unwrap_or(0)
    }

    fn decode(key: &[u8], value: &[u8]) -> Option<StatusRecord> {
        match serde_json::from_slice::<StatusRecord>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key = ?key, error = %e, "Skipping undecodable status record");
                None
            }
        }
    }

    fn collect<I>(iter: I) -> Result<Vec<StatusRecord>, StoreError>
    where
        I: Iterator<Item = sled::Result<(sled::IVec, sled::IVec)>>,
    {
        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if let Some(record) = Self::decode(&key, &value) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl StatusStore for SledStatusStore {
    async fn append(&self, record: StatusRecord) -> Result<(), StoreError> {
        let key = record_key(&record.tank_id, &record.timestamp);
        let value = serde_json::to_vec(&record)?;
        // Note: no flush per write; sled flushes in the background
        let swapped = self
            .records
            .compare_and_swap(key, None as Option<&[u8]>, Some(value))?;
        if swapped.is_err() {
            return Err(StoreError::Duplicate {
                tank_id: record.tank_id,
                timestamp: record.timestamp,
            });
        }
        Ok(())
    }

    async fn submit(&self, status: NewStatus) -> Result<StatusRecord, StoreError> {
        let timestamp = {
            let mut last = self
                .last_assigned
                .lock()
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let ts = next_server_timestamp(*last, Timestamp::now());
            self.meta.insert(LAST_ASSIGNED_KEY, &encode_timestamp(&ts)[..])?;
            *last = Some(ts);
            ts
        };
        let record = status.into_record(timestamp);
        self.append(record.clone()).await?;
        Ok(record)
    }

    async fn latest_at_or_before(
        &self,
        tank_id: &TankId,
        at: Option<Timestamp>,
    ) -> Result<Option<StatusRecord>, StoreError> {
        let prefix = tank_prefix(tank_id);
        let upper = record_key(tank_id, &at.unwrap_or(Timestamp::MAX));
        for item in self.records.range(prefix..=upper).rev() {
            let (key, value) = item?;
            if let Some(record) = Self::decode(&key, &value) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn range(
        &self,
        tank_id: &TankId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<StatusRecord>, StoreError> {
        if from > to {
            return Ok(Vec::new());
        }
        let lower = record_key(tank_id, &from);
        let upper = record_key(tank_id, &to);
        Self::collect(self.records.range(lower..=upper))
    }

    async fn all_records(&self) -> Result<Vec<StatusRecord>, StoreError> {
        let mut records = Self::collect(self.records.iter())?;
        sort_chronologically(&mut records);
        Ok(records)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }

    fn flush(&self) -> Result<(), StoreError> {
        SledStatusStore::flush(self)
    }
}
