//! Point-in-time fleet snapshot
//!
//! For a cursor `T` every tank contributes its latest record at or before
//! `T`, compared against its latest record at or before the end of the
//! previous calendar day. Tanks with nothing at or before `T` are left out.

use chrono::{Days, NaiveDate};
use futures::future::try_join;
use serde::Serialize;

use crate::storage::{StatusStore, StoreError};
use crate::timeline::DayClock;
use crate::types::{FieldValue, StatusRecord, TankId, Timestamp};

use super::{latest_per_tank, max_timestamp};

/// A field whose value differs from the comparison record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: String,
    pub previous: FieldValue,
    /// `None` when the field is no longer present
    pub current: Option<FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRow {
    pub tank_id: TankId,
    pub record: StatusRecord,
    pub previous: Option<StatusRecord>,
    pub changes: Vec<FieldChange>,
}

/// Rendered summary or average cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SummaryCell {
    Number(f64),
    Text(String),
}

/// Summary and average of one field across the snapshot rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    pub field: String,
    pub summary: Option<SummaryCell>,
    pub average: Option<SummaryCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotReport {
    /// Requested cursor; `None` means latest
    pub at: Option<Timestamp>,
    /// Day whose end-of-day state the rows are compared against
    pub comparison_day: NaiveDate,
    pub rows: Vec<SnapshotRow>,
    pub max_timestamp: Option<Timestamp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub summary: Vec<FieldSummary>,
}

/// Fields of `previous` that changed in `current`.
///
/// A field only present in `current` is not a change, nor is a field that
/// was `null` before and is now absent.
pub fn field_changes(current: &StatusRecord, previous: &StatusRecord) -> Vec<FieldChange> {
    previous
        .fields
        .iter()
        .filter_map(|(field, before)| {
            let now = current.field(field);
            let unchanged = now == Some(before) || (now.is_none() && before.is_null());
            (!unchanged).then(|| FieldChange {
                field: field.clone(),
                previous: before.clone(),
                current: now.cloned(),
            })
        })
        .collect()
}

fn render_average(avg: f64) -> SummaryCell {
    if avg.fract() == 0.0 {
        SummaryCell::Number(avg)
    } else {
        SummaryCell::Text(format!("{avg:.1}"))
    }
}

/// Summarize one field, typed by its first present value.
pub fn summarize_field(field: &str, records: &[&StatusRecord]) -> FieldSummary {
    let values: Vec<&FieldValue> = records.iter().filter_map(|r| r.field(field)).collect();
    let empty = FieldSummary {
        field: field.to_string(),
        summary: None,
        average: None,
    };

    match values.first() {
        Some(FieldValue::Bool(_)) => {
            let true_count = values.iter().filter(|v| v.as_bool() == Some(true)).count();
            let pct = (true_count as f64 / values.len() as f64 * 100.0).round();
            FieldSummary {
                summary: Some(SummaryCell::Text(format!("{true_count}/{}", values.len()))),
                average: Some(SummaryCell::Text(format!("{pct}%"))),
                ..empty
            }
        }
        Some(FieldValue::Number(_)) => {
            let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_number()).collect();
            if numbers.is_empty() {
                return empty;
            }
            let sum: f64 = numbers.iter().sum();
            FieldSummary {
                summary: Some(SummaryCell::Number(sum)),
                average: Some(render_average(sum / numbers.len() as f64)),
                ..empty
            }
        }
        Some(FieldValue::Text(_)) => {
            let mut counts: Vec<(&str, usize)> = Vec::new();
            for value in &values {
                if let FieldValue::Text(text) = value {
                    match counts.iter_mut().find(|(seen, _)| seen == text) {
                        Some((_, count)) => *count += 1,
                        None => counts.push((text.as_str(), 1)),
                    }
                }
            }
            let rendered: Vec<String> =
                counts.iter().map(|(text, count)| format!("{text}: {count}")).collect();
            FieldSummary {
                summary: Some(SummaryCell::Text(rendered.join(", "))),
                average: Some(SummaryCell::Text(String::new())),
                ..empty
            }
        }
        _ => empty,
    }
}

/// Assemble the report from per-tank `(current, comparison)` lookups.
pub fn build_snapshot_report(
    lookups: Vec<(TankId, Option<StatusRecord>, Option<StatusRecord>)>,
    at: Option<Timestamp>,
    comparison_day: NaiveDate,
    summary_fields: &[String],
) -> SnapshotReport {
    let rows: Vec<SnapshotRow> = lookups
        .into_iter()
        .filter_map(|(tank_id, current, previous)| {
            let record = current?;
            let changes = previous
                .as_ref()
                .map(|prev| field_changes(&record, prev))
                .unwrap_or_default();
            Some(SnapshotRow {
                tank_id,
                record,
                previous,
                changes,
            })
        })
        .collect();

    let records: Vec<&StatusRecord> = rows.iter().map(|row| &row.record).collect();
    let summary = if records.is_empty() {
        Vec::new()
    } else {
        summary_fields
            .iter()
            .map(|field| summarize_field(field, &records))
            .collect()
    };

    SnapshotReport {
        at,
        comparison_day,
        max_timestamp: max_timestamp(records.iter().copied()),
        rows,
        summary,
    }
}

/// Day before the cursor's day, or before today when there is no cursor.
pub fn comparison_day(at: Option<Timestamp>, clock: &dyn DayClock) -> NaiveDate {
    let day = at.map_or_else(|| clock.today(), |ts| clock.day_of(&ts));
    day.checked_sub_days(Days::new(1)).unwrap_or(day)
}

/// Query both lookups for every tank concurrently and build the report.
pub async fn load_snapshot_report(
    store: &dyn StatusStore,
    tanks: &[TankId],
    at: Option<Timestamp>,
    summary_fields: &[String],
    clock: &dyn DayClock,
) -> Result<SnapshotReport, StoreError> {
    let day = comparison_day(at, clock);
    let cutoff = clock.end_of_day(day);
    let (current, previous) = try_join(
        latest_per_tank(store, tanks, at),
        latest_per_tank(store, tanks, Some(cutoff)),
    )
    .await?;

    let lookups = current
        .into_iter()
        .zip(previous)
        .map(|((tank_id, now), (_, before))| (tank_id, now, before))
        .collect();
    Ok(build_snapshot_report(lookups, at, day, summary_fields))
}
