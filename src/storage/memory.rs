//! In-memory status store
//!
//! Thread-safe via `RwLock`. Not durable: data is lost on restart.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock};

use crate::types::{NewStatus, StatusRecord, TankId, Timestamp};

use super::{next_server_timestamp, sort_chronologically, StatusStore, StoreError};

#[derive(Default)]
pub struct InMemoryStore {
    tanks: RwLock<HashMap<TankId, BTreeMap<Timestamp, StatusRecord>>>,
    last_assigned: Mutex<Option<Timestamp>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with `records`; exact duplicates are dropped.
    pub fn with_records(records: impl IntoIterator<Item = StatusRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut tanks) = store.tanks.write() {
            for record in records {
                tanks
                    .entry(record.tank_id.clone())
                    .or_default()
                    .entry(record.timestamp)
                    .or_insert(record);
            }
        }
        store
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
impl StatusStore for InMemoryStore {
    async fn append(&self, record: StatusRecord) -> Result<(), StoreError> {
        let mut tanks = self.tanks.write().map_err(Self::poisoned)?;
        let log = tanks.entry(record.tank_id.clone()).or_default();
        if log.contains_key(&record.timestamp) {
            return Err(StoreError::Duplicate {
                tank_id: record.tank_id,
                timestamp: record.timestamp,
            });
        }
        log.insert(record.timestamp, record);
        Ok(())
    }

    async fn submit(&self, status: NewStatus) -> Result<StatusRecord, StoreError> {
        let timestamp = {
            let mut last = self.last_assigned.lock().map_err(Self::poisoned)?;
            let ts = next_server_timestamp(*last, Timestamp::now());
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
        let tanks = self.tanks.read().map_err(Self::poisoned)?;
        let Some(log) = tanks.get(tank_id) else {
            return Ok(None);
        };
        let found = match at {
            Some(at) => log.range(..=at).next_back(),
            None => log.iter().next_back(),
        };
        Ok(found.map(|(_, record)| record.clone()))
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
        let tanks = self.tanks.read().map_err(Self::poisoned)?;
        Ok(tanks
            .get(tank_id)
            .map(|log| log.range(from..=to).map(|(_, r)| r.clone()).collect())
            .unwrap_or_default())
    }

    async fn all_records(&self) -> Result<Vec<StatusRecord>, StoreError> {
        let tanks = self.tanks.read().map_err(Self::poisoned)?;
        let mut records: Vec<StatusRecord> =
            tanks.values().flat_map(|log| log.values().cloned()).collect();
        sort_chronologically(&mut records);
        Ok(records)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let tanks = self.tanks.read().map_err(Self::poisoned)?;
        Ok(tanks.values().map(BTreeMap::len).sum())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tank: &str, secs: i64, km: f64) -> StatusRecord {
        StatusRecord::new(tank, Timestamp::new(secs, 0)).with_field("ק\"מ", km)
    }

    #[tokio::test]
    async fn test_latest_at_or_before() {
        let store = InMemoryStore::with_records([
            record("191", 100, 1.0),
            record("191", 200, 2.0),
            record("191", 300, 3.0),
            record("425", 250, 9.0),
        ]);
        let tank = TankId::from("191");

        let latest = store.latest_at_or_before(&tank, None).await.unwrap().unwrap();
        assert_eq!(latest.timestamp.seconds, 300);

        let at = store
            .latest_at_or_before(&tank, Some(Timestamp::new(250, 0)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(at.timestamp.seconds, 200);

        let exact = store
            .latest_at_or_before(&tank, Some(Timestamp::new(200, 0)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exact.timestamp.seconds, 200);

        assert!(store
            .latest_at_or_before(&tank, Some(Timestamp::new(99, 0)))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .latest_at_or_before(&TankId::from("999"), None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_range_is_inclusive_and_ordered() {
        let store = InMemoryStore::with_records([
            record("191", 300, 3.0),
            record("191", 100, 1.0),
            record("191", 200, 2.0),
        ]);
        let got = store
            .range(&TankId::from("191"), Timestamp::new(100, 0), Timestamp::new(200, 0))
            .await
            .unwrap();
        let secs: Vec<i64> = got.iter().map(|r| r.timestamp.seconds).collect();
        assert_eq!(secs, vec![100, 200]);

        let empty = store
            .range(&TankId::from("191"), Timestamp::new(200, 0), Timestamp::new(100, 0))
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_append_rejects_duplicate() {
        let store = InMemoryStore::new();
        store.append(record("191", 100, 1.0)).await.unwrap();
        let err = store.append(record("191", 100, 5.0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        // Same instant on a different tank is fine
        store.append(record("425", 100, 1.0)).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_submit_assigns_increasing_timestamps() {
        let store = InMemoryStore::new();
        let mut previous = None;
        for _ in 0..20 {
            let status = NewStatus {
                tank_id: TankId::from("191"),
                user: None,
                fields: Default::default(),
            };
            let record = store.submit(status).await.unwrap();
            if let Some(prev) = previous {
                assert!(record.timestamp > prev);
            }
            previous = Some(record.timestamp);
        }
        assert_eq!(store.count().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_all_records_sorted_across_tanks() {
        let store = InMemoryStore::with_records([
            record("425", 300, 0.0),
            record("191", 100, 0.0),
            record("417", 200, 0.0),
        ]);
        let all = store.all_records().await.unwrap();
        let tanks: Vec<&str> = all.iter().map(|r| r.tank_id.as_str()).collect();
        assert_eq!(tanks, vec!["191", "417", "425"]);
    }
}
