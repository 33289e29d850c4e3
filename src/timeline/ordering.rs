//! Timestamp ordering and calendar-day helpers
//!
//! Ordering is the derived lexicographic `(seconds, nanoseconds)` order of
//! [`Timestamp`]. Calendar semantics ("which day is this", "end of that day",
//! "what is today") depend on a time zone and on the current instant, so they
//! live behind the [`DayClock`] trait: production uses [`LocalClock`], tests
//! pin both with [`FixedClock`].

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use std::cmp::Ordering;

use crate::types::Timestamp;

/// Total order over timestamps.
pub fn compare(a: &Timestamp, b: &Timestamp) -> Ordering {
    a.cmp(b)
}

/// `true` when `a` is strictly after `b`.
pub fn is_after(a: &Timestamp, b: &Timestamp) -> bool {
    compare(a, b) == Ordering::Greater
}

/// Whole calendar days from `from` to `to` (negative when `to` is earlier).
pub fn calendar_days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Source of "now" and of calendar-day boundaries.
pub trait DayClock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Timestamp;

    /// Calendar day containing `ts`.
    fn day_of(&self, ts: &Timestamp) -> NaiveDate;

    /// First instant of `date` (00:00:00.000).
    fn start_of_day(&self, date: NaiveDate) -> Timestamp;

    /// Day-boundary sentinel for `date` (23:59:59.999).
    fn end_of_day(&self, date: NaiveDate) -> Timestamp;

    /// Calendar day containing [`DayClock::now`].
    fn today(&self) -> NaiveDate {
        self.day_of(&self.now())
    }
}

fn day_in<Tz: TimeZone>(tz: &Tz, ts: &Timestamp) -> NaiveDate {
    ts.to_utc().with_timezone(tz).date_naive()
}

/// Resolve a wall-clock time in `tz`. DST folds pick `pick_latest`; DST gaps
/// fall back to reading the wall-clock value as UTC shifted by the zone's
/// offset at that instant.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime, pick_latest: bool) -> Timestamp {
    let mapped = tz.from_local_datetime(&naive);
    let resolved = if pick_latest { mapped.latest() } else { mapped.earliest() };
    match resolved {
        Some(dt) => Timestamp::from_datetime(&dt),
        None => {
            let offset = tz.offset_from_utc_datetime(&naive).fix();
            let utc = naive - chrono::Duration::seconds(i64::from(offset.local_minus_utc()));
            Timestamp::from_datetime(&Utc.from_utc_datetime(&utc))
        }
    }
}

fn start_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Timestamp {
    match date.and_hms_opt(0, 0, 0) {
        Some(naive) => resolve_local(tz, naive, false),
        None => Timestamp::MIN,
    }
}

fn end_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Timestamp {
    match date.and_hms_milli_opt(23, 59, 59, 999) {
        Some(naive) => resolve_local(tz, naive, true),
        None => Timestamp::MAX,
    }
}

/// Host time zone and system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl DayClock for LocalClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    fn day_of(&self, ts: &Timestamp) -> NaiveDate {
        day_in(&chrono::Local, ts)
    }

    fn start_of_day(&self, date: NaiveDate) -> Timestamp {
        start_in(&chrono::Local, date)
    }

    fn end_of_day(&self, date: NaiveDate) -> Timestamp {
        end_in(&chrono::Local, date)
    }
}

/// Pinned clock with a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: Timestamp,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now: Timestamp, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    /// Clock in UTC pinned at `now`.
    pub fn utc(now: Timestamp) -> Self {
        Self::new(now, Utc.fix())
    }

    /// UTC clock pinned at a wall-clock time on `date`.
    pub fn utc_at(date: NaiveDate, hour: u32, minute: u32) -> Self {
        let now = date
            .and_hms_opt(hour, minute, 0)
            .map(|naive| Timestamp::from_datetime(&Utc.from_utc_datetime(&naive)))
            .unwrap_or_default();
        Self::utc(now)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Same zone, different "now".
    pub fn with_now(self, now: Timestamp) -> Self {
        Self { now, ..self }
    }

    /// Local wall-clock instant in this clock's zone.
    pub fn datetime(&self, ts: &Timestamp) -> DateTime<FixedOffset> {
        ts.to_utc().with_timezone(&self.offset)
    }
}

impl DayClock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn day_of(&self, ts: &Timestamp) -> NaiveDate {
        day_in(&self.offset, ts)
    }

    fn start_of_day(&self, date: NaiveDate) -> Timestamp {
        start_in(&self.offset, date)
    }

    fn end_of_day(&self, date: NaiveDate) -> Timestamp {
        end_in(&self.offset, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_compare_fraction_breaks_ties() {
        let a = Timestamp::new(100, 1);
        let b = Timestamp::new(100, 2);
        assert_eq!(compare(&a, &b), Ordering::Less);
        assert!(is_after(&b, &a));
        assert!(!is_after(&a, &a));
    }

    #[test]
    fn test_end_of_day_is_last_millisecond() {
        let clock = FixedClock::utc_at(date(2025, 2, 10), 12, 0);
        let eod = clock.end_of_day(date(2025, 2, 10));
        let dt = clock.datetime(&eod);
        assert_eq!(dt.to_rfc3339(), "2025-02-10T23:59:59.999+00:00");
        assert_eq!(clock.day_of(&eod), date(2025, 2, 10));
        assert_eq!(clock.day_of(&eod.succ()), date(2025, 2, 10));
        assert_eq!(eod.nanoseconds, 999_000_000);
    }

    #[test]
    fn test_offset_shifts_calendar_day() {
        let utc = FixedClock::utc_at(date(2025, 2, 10), 23, 30);
        let plus_two = FixedClock::new(utc.now(), FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(utc.today(), date(2025, 2, 10));
        assert_eq!(plus_two.today(), date(2025, 2, 11));
    }

    #[test]
    fn test_start_of_day_precedes_end_of_day() {
        let clock = FixedClock::new(Timestamp::default(), FixedOffset::east_opt(7200).unwrap());
        let d = date(2025, 3, 1);
        assert!(clock.start_of_day(d) < clock.end_of_day(d));
        assert_eq!(clock.day_of(&clock.start_of_day(d)), d);
    }

    #[test]
    fn test_calendar_days_between() {
        assert_eq!(calendar_days_between(date(2025, 2, 10), date(2025, 2, 15)), 5);
        assert_eq!(calendar_days_between(date(2025, 2, 15), date(2025, 2, 10)), -5);
    }
}
