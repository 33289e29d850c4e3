//! Gradual-red staleness and fill-level indicators
//!
//! Intensity runs from 0 (clear) to 1 (fully red). The general report
//! applies it to three kinds of cells:
//! - record age: a record from today is clear, `record_max_days` old is red
//! - fill levels: configured indicators summing one or more fields
//! - open issues: red grows with age up to `issue_max_days`

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::{IndicatorConfig, StalenessConfig};
use crate::storage::{StatusStore, StoreError};
use crate::timeline::ordering::calendar_days_between;
use crate::timeline::DayClock;
use crate::types::{FieldValue, StatusRecord, TankId, Timestamp};

use super::{latest_per_tank, max_timestamp};

/// Lower value means more red. `None` stays unstyled.
pub fn gradual_red_intensity(value: Option<f64>, min: f64, max: f64) -> Option<f64> {
    let value = value.filter(|v| v.is_finite())?;
    if max <= min {
        return Some(if value >= max { 0.0 } else { 1.0 });
    }
    let clamped = value.clamp(min, max);
    Some(1.0 - (clamped - min) / (max - min))
}

/// Record-age intensity for a record taken on `record_day`.
pub fn record_staleness(record_day: NaiveDate, today: NaiveDate, max_days: i64) -> f64 {
    let age = calendar_days_between(record_day, today);
    let freshness = (max_days - age) as f64;
    gradual_red_intensity(Some(freshness), 0.0, max_days as f64).unwrap_or(1.0)
}

/// Issue-age intensity: clear on the day it was opened, red at `max_days`.
pub fn issue_age_intensity(created: NaiveDate, today: NaiveDate, max_days: i64) -> f64 {
    let days = calendar_days_between(created, today) + 1;
    let span = (max_days - 1).max(1) as f64;
    ((days - 1) as f64 / span).clamp(0.0, 1.0)
}

/// Sum of an indicator's terms; absent and non-numeric fields count as 0.
pub fn indicator_value(record: &StatusRecord, indicator: &IndicatorConfig) -> f64 {
    indicator
        .terms
        .iter()
        .map(|term| {
            let raw = match record.field(&term.field) {
                Some(FieldValue::Bool(true)) => 1.0,
                Some(value) => value.as_number().unwrap_or(0.0),
                None => 0.0,
            };
            let capped = term.cap.map_or(raw, |cap| raw.min(cap));
            capped * term.weight
        })
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorCell {
    pub name: String,
    pub value: f64,
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCell {
    pub field: String,
    pub failure: String,
    pub age_days: i64,
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralRow {
    pub tank_id: TankId,
    pub timestamp: Timestamp,
    pub staleness: f64,
    pub indicators: Vec<IndicatorCell>,
    pub open_issues: Vec<IssueCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralReport {
    pub rows: Vec<GeneralRow>,
    pub max_timestamp: Option<Timestamp>,
}

fn open_issues(
    record: &StatusRecord,
    today: NaiveDate,
    config: &StalenessConfig,
    clock: &dyn DayClock,
) -> Vec<IssueCell> {
    let mut cells = Vec::new();
    for (field, value) in &record.fields {
        let FieldValue::Issues(issues) = value else {
            continue;
        };
        for issue in issues.iter().filter(|i| !i.fixed && !i.failure.is_empty()) {
            let created = clock.day_of(&issue.creation_date);
            cells.push(IssueCell {
                field: field.clone(),
                failure: issue.failure.clone(),
                age_days: calendar_days_between(created, today) + 1,
                intensity: issue_age_intensity(created, today, config.issue_max_days),
            });
        }
    }
    cells
}

pub fn build_general_report(
    records: &[StatusRecord],
    config: &StalenessConfig,
    clock: &dyn DayClock,
) -> GeneralReport {
    let today = clock.today();
    let rows = records
        .iter()
        .map(|record| GeneralRow {
            tank_id: record.tank_id.clone(),
            timestamp: record.timestamp,
            staleness: record_staleness(clock.day_of(&record.timestamp), today, config.record_max_days),
            indicators: config
                .indicators
                .iter()
                .map(|indicator| {
                    let value = indicator_value(record, indicator);
                    IndicatorCell {
                        name: indicator.name.clone(),
                        value,
                        intensity: gradual_red_intensity(Some(value), indicator.min, indicator.max)
                            .unwrap_or(1.0),
                    }
                })
                .collect(),
            open_issues: open_issues(record, today, config, clock),
        })
        .collect();

    GeneralReport {
        rows,
        max_timestamp: max_timestamp(records),
    }
}

pub async fn load_general_report(
    store: &dyn StatusStore,
    tanks: &[TankId],
    at: Option<Timestamp>,
    config: &StalenessConfig,
    clock: &dyn DayClock,
) -> Result<GeneralReport, StoreError> {
    let records: Vec<StatusRecord> = latest_per_tank(store, tanks, at)
        .await?
        .into_iter()
        .filter_map(|(_, record)| record)
        .collect();
    Ok(build_general_report(&records, config, clock))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::FixedClock;
    use crate::types::Issue;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_gradual_red_intensity() {
        assert_eq!(gradual_red_intensity(None, 0.0, 2.0), None);
        assert_eq!(gradual_red_intensity(Some(0.0), 0.0, 2.0), Some(1.0));
        assert_eq!(gradual_red_intensity(Some(1.0), 0.0, 2.0), Some(0.5));
        assert_eq!(gradual_red_intensity(Some(2.0), 0.0, 2.0), Some(0.0));
        assert_eq!(gradual_red_intensity(Some(-7.0), 0.0, 2.0), Some(1.0));
        assert_eq!(gradual_red_intensity(Some(99.0), 0.0, 2.0), Some(0.0));
        assert_eq!(gradual_red_intensity(Some(5.0), 5.0, 5.0), Some(0.0));
        assert_eq!(gradual_red_intensity(Some(4.0), 5.0, 5.0), Some(1.0));
    }

    #[test]
    fn test_record_staleness_over_two_days() {
        let today = date(2025, 2, 20);
        assert_eq!(record_staleness(today, today, 2), 0.0);
        assert_eq!(record_staleness(date(2025, 2, 19), today, 2), 0.5);
        assert_eq!(record_staleness(date(2025, 2, 18), today, 2), 1.0);
        assert_eq!(record_staleness(date(2025, 1, 1), today, 2), 1.0);
    }

    #[test]
    fn test_issue_age_intensity() {
        let today = date(2025, 2, 28);
        assert_eq!(issue_age_intensity(today, today, 28), 0.0);
        assert_eq!(issue_age_intensity(date(2025, 2, 1), today, 28), 1.0);
        assert_eq!(issue_age_intensity(date(2024, 12, 1), today, 28), 1.0);
        let mid = issue_age_intensity(date(2025, 2, 15), today, 28);
        assert!((mid - 13.0 / 27.0).abs() < 1e-9);
    }

    #[test]
    fn test_indicator_sums_weighted_and_capped_terms() {
        let config = StalenessConfig::default();
        let water = config.indicators.iter().find(|i| i.name == "מים").unwrap();
        let ammo = config.indicators.iter().find(|i| i.name == "תחמושת").unwrap();
        let comms = config
            .indicators
            .iter()
            .find(|i| i.name == "כשירות וקישוריות")
            .unwrap();

        let record = StatusRecord::new("191", Timestamp::new(0, 0))
            .with_field("מים (ג'ריקנים)", 1.0)
            .with_field("מים (שישיות)", 2.0)
            .with_field("ברוס מאג 7.62", 50.0)
            .with_field("כדורי 0.5", 20.0)
            .with_field("כשירות (GPS)", true)
            .with_field("קישוריות (WIFI)", false);

        assert_eq!(indicator_value(&record, water), 23.0);
        assert_eq!(indicator_value(&record, ammo), 59.0);
        assert_eq!(indicator_value(&record, comms), 1.0);
    }

    #[test]
    fn test_general_report_rows() {
        let clock = FixedClock::utc_at(date(2025, 2, 20), 10, 0);
        let opened = Timestamp::from_datetime(&date(2025, 2, 6).and_hms_opt(9, 0, 0).unwrap().and_utc());
        let record = StatusRecord::new("191", clock.start_of_day(date(2025, 2, 19)))
            .with_field("סולר", 700.0)
            .with_field(
                "תקלות קשר",
                FieldValue::Issues(vec![
                    Issue {
                        failure: "radio".into(),
                        fixed: false,
                        creation_date: opened,
                    },
                    Issue {
                        failure: "antenna".into(),
                        fixed: true,
                        creation_date: opened,
                    },
                ]),
            );
        let report = build_general_report(&[record], &StalenessConfig::default(), &clock);

        let row = &report.rows[0];
        assert_eq!(row.staleness, 0.5);
        let fuel = row.indicators.iter().find(|c| c.name == "סולר").unwrap();
        assert_eq!(fuel.intensity, 0.5);
        assert_eq!(row.open_issues.len(), 1);
        assert_eq!(row.open_issues[0].age_days, 15);
    }
}
