//! Derived navigation predicates and the view handed to the UI

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::Timestamp;

use super::history::EntryKind;
use super::navigation::NavigationState;
use super::ordering::DayClock;

/// Which navigation controls are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub can_go_prev_change: bool,
    pub can_go_next_change: bool,
    pub can_go_prev_day: bool,
    pub can_go_next_day: bool,
    pub is_at_latest: bool,
}

impl Availability {
    pub fn of(state: &NavigationState, clock: &dyn DayClock) -> Self {
        let is_at_latest = is_at_latest(state);
        let can_go_next_day = match state.current() {
            Some(current) => clock.day_of(&current) < clock.today() && !is_at_latest,
            None => false,
        };
        Self {
            can_go_prev_change: state.current().is_some() && state.history().len() > 1,
            can_go_next_change: state
                .index()
                .is_some_and(|i| i + 1 < state.history().len()),
            can_go_prev_day: true,
            can_go_next_day,
            is_at_latest,
        }
    }
}

/// Cursor sits exactly on the latest known timestamp.
pub fn is_at_latest(state: &NavigationState) -> bool {
    match (state.current(), state.latest()) {
        (Some(current), Some(latest)) => current == latest,
        _ => false,
    }
}

/// Everything a navigation control bar renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationView {
    pub current_timestamp: Option<Timestamp>,
    pub current_date: Option<NaiveDate>,
    pub current_kind: Option<EntryKind>,
    pub latest_timestamp: Option<Timestamp>,
    pub history_len: usize,
    pub history_index: Option<usize>,
    #[serde(flatten)]
    pub availability: Availability,
    pub is_loading: bool,
}

impl NavigationView {
    pub fn new(state: &NavigationState, clock: &dyn DayClock, is_loading: bool) -> Self {
        Self {
            current_timestamp: state.current(),
            current_date: state.current_date(clock),
            current_kind: state.current_entry().map(|e| e.kind),
            latest_timestamp: state.latest(),
            history_len: state.history().len(),
            history_index: state.index(),
            availability: Availability::of(state, clock),
            is_loading,
        }
    }
}
