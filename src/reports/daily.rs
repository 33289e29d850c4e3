//! Per-tank daily delta computation
//!
//! For every tank:
//! 1. bucket records by local calendar day, keeping the last record per day
//! 2. split the sorted days into ranges wherever two days are more than
//!    `gap_days` apart
//! 3. within a range, delta = today's reading minus the previous day's
//!    reading, filtered by the anomaly rules; the first day of a range is a
//!    seed and carries no delta
//!
//! Rows are then back-filled so every tank covers every day between the
//! earliest and latest representative day of the fleet, and a summary and
//! average row are added per day. Nothing here errors: unusable readings
//! become `None`.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::DeltaConfig;
use crate::storage::{StatusStore, StoreError};
use crate::timeline::ordering::calendar_days_between;
use crate::timeline::DayClock;
use crate::types::{StatusRecord, TankId};

use super::history_per_tank;

/// Anomaly thresholds and tracked fields
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaRules {
    pub gap_days: i64,
    pub max_jump: f64,
    pub km_field: String,
    pub engine_hours_field: String,
}

impl From<&DeltaConfig> for DeltaRules {
    fn from(config: &DeltaConfig) -> Self {
        Self {
            gap_days: config.gap_days,
            max_jump: config.max_jump,
            km_field: config.km_field.clone(),
            engine_hours_field: config.engine_hours_field.clone(),
        }
    }
}

impl Default for DeltaRules {
    fn default() -> Self {
        Self::from(&DeltaConfig::default())
    }
}

impl DeltaRules {
    /// Keep a delta only when it is plausible.
    ///
    /// Implausible: magnitude above `max_jump`. Negative corrections
    /// within the limit pass unchanged.
    pub fn filter(&self, delta: f64) -> Option<f64> {
        if !delta.is_finite() || delta.abs() > self.max_jump {
            None
        } else {
            Some(delta)
        }
    }

    fn delta(&self, field: &str, current: &StatusRecord, previous: &StatusRecord) -> Option<f64> {
        let now = current.number(field)?;
        let before = previous.number(field)?;
        self.filter(now - before)
    }
}

/// Deltas of one tank (or one aggregate row) for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyDelta {
    pub km: Option<f64>,
    pub engine_hours: Option<f64>,
}

impl DailyDelta {
    pub const EMPTY: Self = Self {
        km: None,
        engine_hours: None,
    };
}

/// One report row: a tank and its deltas keyed by day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TankDeltas {
    pub tank_id: TankId,
    pub daily: BTreeMap<NaiveDate, DailyDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    /// Every day from the earliest to the latest representative day
    pub dates: Vec<NaiveDate>,
    pub tanks: Vec<TankDeltas>,
    /// Per-day sum of the non-null tank deltas
    pub summary: BTreeMap<NaiveDate, DailyDelta>,
    /// Per-day mean of the non-null tank deltas, one decimal
    pub average: BTreeMap<NaiveDate, DailyDelta>,
}

// ============================================================================
// Per-tank computation
// ============================================================================

/// Last record of each local calendar day.
pub fn representative_days<'a>(
    records: &'a [StatusRecord],
    clock: &dyn DayClock,
) -> BTreeMap<NaiveDate, &'a StatusRecord> {
    let mut days: BTreeMap<NaiveDate, &StatusRecord> = BTreeMap::new();
    for record in records {
        let day = clock.day_of(&record.timestamp);
        match days.get(&day) {
            Some(kept) if kept.timestamp >= record.timestamp => {}
            _ => {
                days.insert(day, record);
            }
        }
    }
    days
}

/// Split ascending days into maximal runs with gaps of at most `gap_days`.
pub fn split_ranges(days: &[NaiveDate], gap_days: i64) -> Vec<Vec<NaiveDate>> {
    let mut ranges: Vec<Vec<NaiveDate>> = Vec::new();
    let mut current: Vec<NaiveDate> = Vec::new();
    for &day in days {
        if let Some(&last) = current.last() {
            if calendar_days_between(last, day) > gap_days {
                ranges.push(std::mem::take(&mut current));
            }
        }
        current.push(day);
    }
    if !current.is_empty() {
        ranges.push(current);
    }
    ranges
}

/// Deltas of one tank, keyed by its representative days.
pub fn tank_deltas(
    records: &[StatusRecord],
    rules: &DeltaRules,
    clock: &dyn DayClock,
) -> BTreeMap<NaiveDate, DailyDelta> {
    let days = representative_days(records, clock);
    let sorted: Vec<NaiveDate> = days.keys().copied().collect();

    let mut deltas = BTreeMap::new();
    for range in split_ranges(&sorted, rules.gap_days) {
        deltas.insert(range[0], DailyDelta::EMPTY);
        for pair in range.windows(2) {
            let (previous, current) = (days[&pair[0]], days[&pair[1]]);
            deltas.insert(
                pair[1],
                DailyDelta {
                    km: rules.delta(&rules.km_field, current, previous),
                    engine_hours: rules.delta(&rules.engine_hours_field, current, previous),
                },
            );
        }
    }
    deltas
}

// ============================================================================
// Fleet report
// ============================================================================

fn every_day(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    first.iter_days().take_while(|d| *d <= last).collect()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn aggregate(values: impl Iterator<Item = Option<f64>>) -> (Option<f64>, Option<f64>) {
    let present: Vec<f64> = values.flatten().collect();
    if present.is_empty() {
        return (None, None);
    }
    let sum: f64 = present.iter().sum();
    (Some(sum), Some(round1(sum / present.len() as f64)))
}

/// Assemble the aligned report from each tank's full ordered history.
pub fn build_daily_report(
    histories: &[(TankId, Vec<StatusRecord>)],
    rules: &DeltaRules,
    clock: &dyn DayClock,
) -> DailyReport {
    let mut tanks: Vec<TankDeltas> = histories
        .iter()
        .map(|(tank_id, records)| TankDeltas {
            tank_id: tank_id.clone(),
            daily: tank_deltas(records, rules, clock),
        })
        .collect();

    let first = tanks.iter().filter_map(|t| t.daily.keys().next()).min().copied();
    let last = tanks.iter().filter_map(|t| t.daily.keys().next_back()).max().copied();
    let dates = match (first, last) {
        (Some(first), Some(last)) => every_day(first, last),
        _ => Vec::new(),
    };

    for tank in &mut tanks {
        for date in &dates {
            tank.daily.entry(*date).or_insert(DailyDelta::EMPTY);
        }
    }

    let mut summary = BTreeMap::new();
    let mut average = BTreeMap::new();
    for date in &dates {
        let (km_sum, km_avg) = aggregate(tanks.iter().map(|t| t.daily[date].km));
        let (eh_sum, eh_avg) = aggregate(tanks.iter().map(|t| t.daily[date].engine_hours));
        summary.insert(
            *date,
            DailyDelta {
                km: km_sum,
                engine_hours: eh_sum,
            },
        );
        average.insert(
            *date,
            DailyDelta {
                km: km_avg,
                engine_hours: eh_avg,
            },
        );
    }

    DailyReport {
        dates,
        tanks,
        summary,
        average,
    }
}

/// Query every tank's history and build the report.
pub async fn load_daily_report(
    store: &dyn StatusStore,
    tanks: &[TankId],
    rules: &DeltaRules,
    clock: &dyn DayClock,
) -> Result<DailyReport, StoreError> {
    let histories = history_per_tank(store, tanks).await?;
    Ok(build_daily_report(&histories, rules, clock))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::FixedClock;
    use crate::types::Timestamp;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock::utc_at(date(2025, 3, 31), 12, 0)
    }

    fn at(day: NaiveDate, hour: u32) -> Timestamp {
        Timestamp::from_datetime(&day.and_hms_opt(hour, 0, 0).unwrap().and_utc())
    }

    fn reading(tank: &str, day: NaiveDate, hour: u32, km: f64) -> StatusRecord {
        StatusRecord::new(tank, at(day, hour)).with_field("ק\"מ", km)
    }

    #[test]
    fn test_filter_rules() {
        let rules = DeltaRules::default();
        assert_eq!(rules.filter(50.0), Some(50.0));
        assert_eq!(rules.filter(1000.0), Some(1000.0));
        assert_eq!(rules.filter(1400.0), None);
        assert_eq!(rules.filter(-10.0), Some(-10.0));
        assert_eq!(rules.filter(0.0), Some(0.0));
        assert_eq!(rules.filter(-49.9), Some(-49.9));
        assert_eq!(rules.filter(-50.0), Some(-50.0));
        assert_eq!(rules.filter(-500.0), Some(-500.0));
        assert_eq!(rules.filter(-1000.0), Some(-1000.0));
        assert_eq!(rules.filter(-6901.0), None);
        assert_eq!(rules.filter(f64::NAN), None);
    }

    #[test]
    fn test_last_record_of_day_wins() {
        let day = date(2025, 2, 10);
        let records = vec![
            reading("191", day, 8, 100.0),
            reading("191", day, 18, 120.0),
            reading("191", day, 12, 110.0),
        ];
        let days = representative_days(&records, &clock());
        assert_eq!(days.len(), 1);
        assert_eq!(days[&day].number("ק\"מ"), Some(120.0));
    }

    #[test]
    fn test_split_ranges_on_large_gap() {
        let days = vec![date(2025, 1, 1), date(2025, 1, 15), date(2025, 1, 30), date(2025, 2, 1)];
        let ranges = split_ranges(&days, 14);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], vec![date(2025, 1, 1), date(2025, 1, 15)]);
        assert_eq!(ranges[1], vec![date(2025, 1, 30), date(2025, 2, 1)]);
        assert!(split_ranges(&[], 14).is_empty());
    }

    #[test]
    fn test_consecutive_day_deltas() {
        let records = vec![
            reading("191", date(2025, 2, 10), 9, 100.0),
            reading("191", date(2025, 2, 11), 9, 150.0),
            reading("191", date(2025, 2, 12), 9, 1500.0),
            reading("191", date(2025, 2, 13), 9, 1490.0),
        ];
        let deltas = tank_deltas(&records, &DeltaRules::default(), &clock());
        assert_eq!(deltas[&date(2025, 2, 10)].km, None);
        assert_eq!(deltas[&date(2025, 2, 11)].km, Some(50.0));
        assert_eq!(deltas[&date(2025, 2, 12)].km, None);
        assert_eq!(deltas[&date(2025, 2, 13)].km, Some(-10.0));
        // No engine-hours readings at all
        assert!(deltas.values().all(|d| d.engine_hours.is_none()));
    }

    #[test]
    fn test_non_numeric_reading_yields_none() {
        let records = vec![
            reading("191", date(2025, 2, 10), 9, 100.0),
            StatusRecord::new("191", at(date(2025, 2, 11), 9)).with_field("ק\"מ", "150"),
        ];
        let deltas = tank_deltas(&records, &DeltaRules::default(), &clock());
        assert_eq!(deltas[&date(2025, 2, 11)], DailyDelta::EMPTY);
    }

    #[test]
    fn test_report_backfills_and_aggregates() {
        let histories = vec![
            (
                TankId::from("191"),
                vec![
                    reading("191", date(2025, 2, 10), 9, 500.0),
                    reading("191", date(2025, 2, 12), 9, 530.0),
                ],
            ),
            (
                TankId::from("425"),
                vec![
                    reading("425", date(2025, 2, 11), 9, 10.0),
                    reading("425", date(2025, 2, 12), 9, 21.0),
                ],
            ),
            (TankId::from("417"), Vec::new()),
        ];
        let report = build_daily_report(&histories, &DeltaRules::default(), &clock());

        assert_eq!(report.dates, vec![date(2025, 2, 10), date(2025, 2, 11), date(2025, 2, 12)]);
        for tank in &report.tanks {
            assert_eq!(tank.daily.len(), 3, "tank {} not aligned", tank.tank_id);
        }
        let empty = &report.tanks[2];
        assert!(empty.daily.values().all(|d| *d == DailyDelta::EMPTY));

        let day = date(2025, 2, 12);
        assert_eq!(report.summary[&day].km, Some(41.0));
        assert_eq!(report.average[&day].km, Some(20.5));
        assert_eq!(report.summary[&date(2025, 2, 11)].km, None);
        assert_eq!(report.average[&day].engine_hours, None);
    }

    #[test]
    fn test_empty_fleet_has_no_dates() {
        let histories = vec![(TankId::from("191"), Vec::new())];
        let report = build_daily_report(&histories, &DeltaRules::default(), &clock());
        assert!(report.dates.is_empty());
        assert!(report.tanks[0].daily.is_empty());
    }
}
