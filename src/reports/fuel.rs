//! Fuel report: diesel needed to top up every tank at the cursor.

use serde::Serialize;

use crate::config::FuelConfig;
use crate::storage::{StatusStore, StoreError};
use crate::types::{StatusRecord, TankId, Timestamp};

use super::{latest_per_tank, max_timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelRow {
    pub tank_id: TankId,
    pub timestamp: Timestamp,
    /// Reported diesel, if the record carries a number
    pub fuel: Option<f64>,
    pub needed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelReport {
    pub full_tank: f64,
    pub rows: Vec<FuelRow>,
    pub total_needed: f64,
    pub max_timestamp: Option<Timestamp>,
}

/// Rows for tanks that have a record; a missing reading counts as empty.
pub fn build_fuel_report(records: &[StatusRecord], config: &FuelConfig) -> FuelReport {
    let rows: Vec<FuelRow> = records
        .iter()
        .map(|record| {
            let fuel = record.number(&config.fuel_field);
            FuelRow {
                tank_id: record.tank_id.clone(),
                timestamp: record.timestamp,
                fuel,
                needed: config.full_tank_liters - fuel.unwrap_or(0.0),
            }
        })
        .collect();

    FuelReport {
        full_tank: config.full_tank_liters,
        total_needed: rows.iter().map(|r| r.needed).sum(),
        max_timestamp: max_timestamp(records),
        rows,
    }
}

pub async fn load_fuel_report(
    store: &dyn StatusStore,
    tanks: &[TankId],
    at: Option<Timestamp>,
    config: &FuelConfig,
) -> Result<FuelReport, StoreError> {
    let records: Vec<StatusRecord> = latest_per_tank(store, tanks, at)
        .await?
        .into_iter()
        .filter_map(|(_, record)| record)
        .collect();
    Ok(build_fuel_report(&records, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needed_fuel_and_total() {
        let config = FuelConfig::default();
        let records = vec![
            StatusRecord::new("191", Timestamp::new(10, 0)).with_field("סולר", 1000.0),
            StatusRecord::new("425", Timestamp::new(20, 0)),
            StatusRecord::new("417", Timestamp::new(15, 0)).with_field("סולר", "full"),
        ];
        let report = build_fuel_report(&records, &config);

        assert_eq!(report.rows[0].needed, 400.0);
        assert_eq!(report.rows[1].fuel, None);
        assert_eq!(report.rows[1].needed, 1400.0);
        assert_eq!(report.rows[2].needed, 1400.0);
        assert_eq!(report.total_needed, 3200.0);
        assert_eq!(report.max_timestamp, Some(Timestamp::new(20, 0)));
    }

    #[test]
    fn test_empty_fleet() {
        let report = build_fuel_report(&[], &FuelConfig::default());
        assert!(report.rows.is_empty());
        assert_eq!(report.total_needed, 0.0);
        assert_eq!(report.max_timestamp, None);
    }
}
