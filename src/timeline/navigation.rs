//! Navigation state machine
//!
//! `NavigationState` is an explicit value; every operation consumes it and
//! returns the next state. The hosting layer ([`super::session`]) owns the
//! single mutable cell and applies transitions atomically.
//!
//! Two step granularities run over the same timestamp line:
//! - changes: neighbouring entries of the visited history
//! - days: end-of-day sentinels (23:59:59.999) used as "latest record at or
//!   before" query bounds

use chrono::NaiveDate;
use serde::Serialize;
use std::str::FromStr;

use crate::types::Timestamp;

use super::history::{update_latest, History, HistoryEntry};
use super::ordering::DayClock;

/// Session-local navigation snapshot.
///
/// Invariant: `history[index] == current` whenever both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationState {
    current: Option<Timestamp>,
    history: History,
    index: Option<usize>,
    latest: Option<Timestamp>,
}

impl NavigationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Timestamp> {
        self.current
    }

    pub fn latest(&self) -> Option<Timestamp> {
        self.latest
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// The history entry under the cursor.
    pub fn current_entry(&self) -> Option<&HistoryEntry> {
        self.index.and_then(|i| self.history.get(i))
    }

    /// Calendar day of the cursor.
    pub fn current_date(&self, clock: &dyn DayClock) -> Option<NaiveDate> {
        self.current.map(|ts| clock.day_of(&ts))
    }

    fn visit(self, entry: HistoryEntry) -> Self {
        let (history, index) = self.history.insert_chronological(entry);
        Self {
            current: Some(entry.at),
            history,
            index: Some(index),
            latest: self.latest,
        }
    }

    fn move_to(self, index: usize) -> Self {
        let Some(at) = self.history.get(index).map(|e| e.at) else {
            return self;
        };
        Self {
            current: Some(at),
            index: Some(index),
            ..self
        }
    }

    /// Navigate to a data timestamp, typically the newest across a fresh
    /// per-tank query. Records it as the latest known when it is newer.
    pub fn go_to_timestamp(self, ts: Timestamp) -> Self {
        let latest = update_latest(self.latest, ts);
        Self {
            latest,
            ..self.visit(HistoryEntry::real(ts))
        }
    }

    pub fn go_to_prev_change(self) -> Self {
        match self.index {
            Some(i) if i > 0 => self.move_to(i - 1),
            _ => self,
        }
    }

    pub fn go_to_next_change(self) -> Self {
        match self.index {
            Some(i) if i + 1 < self.history.len() => self.move_to(i + 1),
            _ => self,
        }
    }

    /// Step to the end of the previous calendar day.
    ///
    /// Starts from the cursor, else the latest known timestamp, else now.
    /// Never checks whether data exists for that day.
    pub fn go_to_prev_day(self, clock: &dyn DayClock) -> Self {
        let start = self.current.or(self.latest).unwrap_or_else(|| clock.now());
        match clock.day_of(&start).pred_opt() {
            Some(prev) => self.visit(HistoryEntry::day_boundary(prev, clock.end_of_day(prev))),
            None => self,
        }
    }

    /// Step to the next calendar day, never past today.
    ///
    /// Landing on the latest timestamp's day jumps to that real timestamp
    /// instead of synthesizing a sentinel.
    pub fn go_to_next_day(self, clock: &dyn DayClock) -> Self {
        let Some(current) = self.current else {
            return self;
        };
        let today = clock.today();
        let current_day = clock.day_of(&current);
        if current_day >= today {
            return self;
        }

        let next = current_day.succ_opt().map_or(today, |d| d.min(today));

        if let Some(latest) = self.latest {
            if clock.day_of(&latest) == next {
                return self.visit(HistoryEntry::real(latest));
            }
        }

        self.visit(HistoryEntry::day_boundary(next, clock.end_of_day(next)))
    }

    /// Return to the latest known timestamp.
    pub fn go_to_current(self) -> Self {
        match self.latest {
            Some(latest) => self.visit(HistoryEntry::real(latest)),
            None => self,
        }
    }
}

/// A navigation request, applied by [`Transition::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    GoTo(Timestamp),
    PrevChange,
    NextChange,
    PrevDay,
    NextDay,
    Current,
}

impl Transition {
    pub fn apply(self, state: NavigationState, clock: &dyn DayClock) -> NavigationState {
        match self {
            Self::GoTo(ts) => state.go_to_timestamp(ts),
            Self::PrevChange => state.go_to_prev_change(),
            Self::NextChange => state.go_to_next_change(),
            Self::PrevDay => state.go_to_prev_day(clock),
            Self::NextDay => state.go_to_next_day(clock),
            Self::Current => state.go_to_current(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GoTo(_) => "goto",
            Self::PrevChange => "prev-change",
            Self::NextChange => "next-change",
            Self::PrevDay => "prev-day",
            Self::NextDay => "next-day",
            Self::Current => "current",
        }
    }
}

/// Error for an unknown action name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown navigation action '{0}'")]
pub struct UnknownTransition(pub String);

impl FromStr for Transition {
    type Err = UnknownTransition;

    /// Parses the argument-free actions; `goto` needs a timestamp and is
    /// built directly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prev-change" => Ok(Self::PrevChange),
            "next-change" => Ok(Self::NextChange),
            "prev-day" => Ok(Self::PrevDay),
            "next-day" => Ok(Self::NextDay),
            "current" => Ok(Self::Current),
            other => Err(UnknownTransition(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::history::EntryKind;
    use crate::timeline::ordering::FixedClock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// UTC clock at 2025-02-20 10:00
    fn clock() -> FixedClock {
        FixedClock::utc_at(date(2025, 2, 20), 10, 0)
    }

    /// 2025-02-`day` at `hour`:00 UTC
    fn at(day: u32, hour: u32) -> Timestamp {
        let naive = date(2025, 2, day).and_hms_opt(hour, 0, 0).unwrap();
        Timestamp::from_datetime(&naive.and_utc())
    }

    fn assert_cursor_invariant(state: &NavigationState) {
        if let (Some(i), Some(current)) = (state.index(), state.current()) {
            assert_eq!(state.history().get(i).unwrap().at, current);
        }
    }

    #[test]
    fn test_first_goto_initialises_everything() {
        let state = NavigationState::new().go_to_timestamp(at(18, 9));
        assert_eq!(state.current(), Some(at(18, 9)));
        assert_eq!(state.latest(), Some(at(18, 9)));
        assert_eq!(state.index(), Some(0));
        assert_eq!(state.history().len(), 1);
    }

    #[test]
    fn test_goto_older_keeps_latest() {
        let state = NavigationState::new()
            .go_to_timestamp(at(18, 9))
            .go_to_timestamp(at(15, 9));
        assert_eq!(state.latest(), Some(at(18, 9)));
        assert_eq!(state.current(), Some(at(15, 9)));
        assert_eq!(state.index(), Some(0));
        assert_cursor_invariant(&state);
    }

    #[test]
    fn test_goto_existing_does_not_duplicate() {
        let state = NavigationState::new()
            .go_to_timestamp(at(15, 9))
            .go_to_timestamp(at(18, 9))
            .go_to_timestamp(at(15, 9));
        assert_eq!(state.history().len(), 2);
        assert_eq!(state.index(), Some(0));
    }

    #[test]
    fn test_change_steps_are_bounded() {
        let state = NavigationState::new()
            .go_to_timestamp(at(10, 9))
            .go_to_timestamp(at(12, 9))
            .go_to_timestamp(at(14, 9));
        assert_eq!(state.index(), Some(2));

        let state = state.go_to_prev_change().go_to_prev_change();
        assert_eq!(state.current(), Some(at(10, 9)));
        let state = state.go_to_prev_change();
        assert_eq!(state.index(), Some(0));

        let state = state.go_to_next_change().go_to_next_change().go_to_next_change();
        assert_eq!(state.index(), Some(2));
        assert_eq!(state.current(), Some(at(14, 9)));
        assert_cursor_invariant(&state);
    }

    #[test]
    fn test_change_steps_on_empty_history_are_noops() {
        let state = NavigationState::new().go_to_prev_change().go_to_next_change();
        assert_eq!(state, NavigationState::new());
    }

    #[test]
    fn test_prev_day_synthesizes_end_of_day() {
        let clock = clock();
        let state = NavigationState::new()
            .go_to_timestamp(at(18, 9))
            .go_to_prev_day(&clock);
        assert_eq!(state.current(), Some(clock.end_of_day(date(2025, 2, 17))));
        assert_eq!(state.index(), Some(0));
        assert_eq!(
            state.current_entry().unwrap().kind,
            EntryKind::DayBoundary(date(2025, 2, 17))
        );
        assert_eq!(state.latest(), Some(at(18, 9)));
    }

    #[test]
    fn test_prev_day_without_anything_starts_from_now() {
        let clock = clock();
        let state = NavigationState::new().go_to_prev_day(&clock);
        assert_eq!(state.current_date(&clock), Some(date(2025, 2, 19)));
        assert_eq!(state.latest(), None);
    }

    #[test]
    fn test_prev_day_keeps_history_sorted_after_jumping_back() {
        let clock = clock();
        let state = NavigationState::new()
            .go_to_timestamp(at(10, 9))
            .go_to_timestamp(at(18, 9))
            .go_to_prev_day(&clock);
        let instants: Vec<_> = state.history().entries().iter().map(|e| e.at).collect();
        let mut sorted = instants.clone();
        sorted.sort();
        assert_eq!(instants, sorted);
        assert_eq!(state.index(), Some(1));
        assert_cursor_invariant(&state);
    }

    #[test]
    fn test_next_day_is_noop_today() {
        let clock = clock();
        let state = NavigationState::new().go_to_timestamp(at(20, 8));
        let next = state.clone().go_to_next_day(&clock);
        assert_eq!(next, state);
    }

    #[test]
    fn test_next_day_without_cursor_is_noop() {
        let clock = clock();
        assert_eq!(NavigationState::new().go_to_next_day(&clock), NavigationState::new());
    }

    #[test]
    fn test_next_day_snaps_to_latest_on_its_day() {
        let clock = clock();
        let state = NavigationState::new()
            .go_to_timestamp(at(19, 7))
            .go_to_prev_day(&clock)
            .go_to_next_day(&clock);
        assert_eq!(state.current(), Some(at(19, 7)));
        assert_eq!(state.history().len(), 2);
        assert_cursor_invariant(&state);
    }

    #[test]
    fn test_next_day_synthesizes_boundary_before_latest_day() {
        let clock = clock();
        let state = NavigationState::new()
            .go_to_timestamp(at(19, 7))
            .go_to_prev_day(&clock)
            .go_to_prev_day(&clock)
            .go_to_prev_day(&clock);
        assert_eq!(state.current_date(&clock), Some(date(2025, 2, 16)));

        let state = state.go_to_next_day(&clock);
        assert_eq!(state.current(), Some(clock.end_of_day(date(2025, 2, 17))));
        assert_eq!(state.history().len(), 4);
    }

    #[test]
    fn test_next_day_caps_at_today() {
        let clock = clock();
        let state = NavigationState::new()
            .go_to_timestamp(at(5, 12))
            .go_to_prev_day(&clock);
        let mut state = state;
        for _ in 0..40 {
            state = state.go_to_next_day(&clock);
            assert!(state.current_date(&clock).unwrap() <= clock.today());
        }
        assert_eq!(state.current_date(&clock), Some(clock.today()));
    }

    #[test]
    fn test_go_to_current_returns_to_latest() {
        let clock = clock();
        let state = NavigationState::new()
            .go_to_timestamp(at(18, 9))
            .go_to_prev_day(&clock)
            .go_to_current();
        assert_eq!(state.current(), Some(at(18, 9)));
        assert_eq!(state.history().len(), 2);

        assert_eq!(NavigationState::new().go_to_current(), NavigationState::new());
    }

    #[test]
    fn test_transition_names_parse() {
        for name in ["prev-change", "next-change", "prev-day", "next-day", "current"] {
            let t: Transition = name.parse().unwrap();
            assert_eq!(t.name(), name);
        }
        assert!("goto".parse::<Transition>().is_err());
        assert!("sideways".parse::<Transition>().is_err());
    }
}
