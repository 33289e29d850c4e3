//! Consumption ledger
//!
//! Every record of every tank, oldest first, reduced to its consumption
//! fields (names starting with the configured prefix). Rows where all of
//! those fields are zero or absent are dropped.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::ConsumptionConfig;
use crate::storage::{StatusStore, StoreError};
use crate::timeline::DayClock;
use crate::types::{StatusRecord, TankId, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionRow {
    pub date: NaiveDate,
    pub timestamp: Timestamp,
    pub tank_id: TankId,
    pub values: BTreeMap<String, f64>,
}

/// Ledger column: the raw field name and its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumptionColumn {
    pub field: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionLedger {
    /// Union of consumption fields across every record, in first-seen order
    pub columns: Vec<ConsumptionColumn>,
    pub rows: Vec<ConsumptionRow>,
}

fn label(field: &str, prefix: &str) -> String {
    let rest = field.strip_prefix(prefix).unwrap_or(field);
    rest.trim_start_matches(|c: char| c == ':' || c.is_whitespace())
        .to_string()
}

/// Build the ledger from records in ascending time order.
pub fn build_consumption_ledger(
    records: &[StatusRecord],
    config: &ConsumptionConfig,
    clock: &dyn DayClock,
) -> ConsumptionLedger {
    let prefix = config.field_prefix.as_str();
    let mut columns: Vec<ConsumptionColumn> = Vec::new();
    let mut rows = Vec::new();

    for record in records {
        let values: BTreeMap<String, f64> = record
            .fields
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, value)| (name.clone(), value.as_number().unwrap_or(0.0)))
            .collect();

        for name in values.keys() {
            if !columns.iter().any(|c| &c.field == name) {
                columns.push(ConsumptionColumn {
                    field: name.clone(),
                    label: label(name, prefix),
                });
            }
        }

        if values.values().all(|v| *v == 0.0) {
            continue;
        }
        rows.push(ConsumptionRow {
            date: clock.day_of(&record.timestamp),
            timestamp: record.timestamp,
            tank_id: record.tank_id.clone(),
            values,
        });
    }

    ConsumptionLedger { columns, rows }
}

pub async fn load_consumption_ledger(
    store: &dyn StatusStore,
    config: &ConsumptionConfig,
    clock: &dyn DayClock,
) -> Result<ConsumptionLedger, StoreError> {
    let records = store.all_records().await?;
    Ok(build_consumption_ledger(&records, config, clock))
}
