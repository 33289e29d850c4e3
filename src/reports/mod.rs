//! Report assembly
//!
//! Each report queries the store per tank, fanning the requests out
//! concurrently and aggregating only after every tank has answered:
//! - `snapshot`: point-in-time records with previous-day comparison
//! - `daily`: day-over-day deltas of odometer and engine hours
//! - `fuel`: diesel still needed to fill every tank
//! - `consumption`: ledger of consumption fields across all records
//! - `staleness`: gradual-red indicators for the general report

pub mod consumption;
pub mod daily;
pub mod fuel;
pub mod snapshot;
pub mod staleness;

pub use consumption::{build_consumption_ledger, ConsumptionLedger, ConsumptionRow};
pub use daily::{build_daily_report, DailyDelta, DailyReport, DeltaRules, TankDeltas};
pub use fuel::{build_fuel_report, FuelReport, FuelRow};
pub use snapshot::{build_snapshot_report, FieldChange, FieldSummary, SnapshotReport, SnapshotRow};
pub use staleness::{build_general_report, gradual_red_intensity, GeneralReport, GeneralRow};

use futures::future::try_join_all;

use crate::storage::{StatusStore, StoreError};
use crate::types::{StatusRecord, TankId, Timestamp};

/// Latest record `<= at` for every tank, in `tanks` order.
pub async fn latest_per_tank(
    store: &dyn StatusStore,
    tanks: &[TankId],
    at: Option<Timestamp>,
) -> Result<Vec<(TankId, Option<StatusRecord>)>, StoreError> {
    let lookups = tanks.iter().map(|tank| async move {
        let record = store.latest_at_or_before(tank, at).await?;
        Ok::<_, StoreError>((tank.clone(), record))
    });
    try_join_all(lookups).await
}

/// Full ordered history of every tank, in `tanks` order.
pub async fn history_per_tank(
    store: &dyn StatusStore,
    tanks: &[TankId],
) -> Result<Vec<(TankId, Vec<StatusRecord>)>, StoreError> {
    let lookups = tanks.iter().map(|tank| async move {
        let records = store.range(tank, Timestamp::MIN, Timestamp::MAX).await?;
        Ok::<_, StoreError>((tank.clone(), records))
    });
    try_join_all(lookups).await
}

/// Newest timestamp among `records`.
pub fn max_timestamp<'a>(records: impl IntoIterator<Item = &'a StatusRecord>) -> Option<Timestamp> {
    records.into_iter().map(|r| r.timestamp).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    #[tokio::test]
    async fn test_latest_per_tank_keeps_tank_order() {
        let store = InMemoryStore::with_records([
            StatusRecord::new("191", Timestamp::new(10, 0)),
            StatusRecord::new("425", Timestamp::new(20, 0)),
        ]);
        let tanks: Vec<TankId> = ["425", "417", "191"].into_iter().map(TankId::from).collect();
        let got = latest_per_tank(&store, &tanks, None).await.unwrap();

        let ids: Vec<&str> = got.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(ids, vec!["425", "417", "191"]);
        assert!(got[1].1.is_none());
        assert_eq!(
            max_timestamp(got.iter().filter_map(|(_, r)| r.as_ref())),
            Some(Timestamp::new(20, 0))
        );
    }
}
