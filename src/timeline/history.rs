//! Visited-timestamp history
//!
//! An ascending, duplicate-free sequence of instants a navigation session has
//! visited or discovered. Entries are either real data timestamps or
//! synthesized end-of-day sentinels; both order and de-duplicate by instant
//! alone.

use chrono::NaiveDate;
use serde::Serialize;

use crate::types::Timestamp;

use super::ordering::is_after;

/// What produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "date", rename_all = "camelCase")]
pub enum EntryKind {
    /// A timestamp taken from actual status data
    Real,
    /// End-of-day query bound synthesized for a calendar day
    DayBoundary(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub at: Timestamp,
    pub kind: EntryKind,
}

impl HistoryEntry {
    pub fn real(at: Timestamp) -> Self {
        Self { at, kind: EntryKind::Real }
    }

    pub fn day_boundary(date: NaiveDate, at: Timestamp) -> Self {
        Self {
            at,
            kind: EntryKind::DayBoundary(date),
        }
    }
}

/// Ordered history of visited instants. Only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Index of the entry at exactly `ts`, if present.
    pub fn position(&self, ts: &Timestamp) -> Option<usize> {
        self.entries.binary_search_by(|e| e.at.cmp(ts)).ok()
    }

    /// Insert `entry` preserving ascending order.
    ///
    /// When an entry with the same instant already exists the history is
    /// returned unchanged with that entry's index. A real timestamp landing
    /// exactly on a day-boundary sentinel upgrades the sentinel to `Real`.
    pub fn insert_chronological(mut self, entry: HistoryEntry) -> (Self, usize) {
        match self.entries.binary_search_by(|e| e.at.cmp(&entry.at)) {
            Ok(index) => {
                if entry.kind == EntryKind::Real {
                    self.entries[index].kind = EntryKind::Real;
                }
                (self, index)
            }
            Err(index) => {
                self.entries.insert(index, entry);
                (self, index)
            }
        }
    }
}

/// `ts` when it is strictly after `latest` (or nothing is known yet),
/// otherwise `latest` unchanged.
pub fn update_latest(latest: Option<Timestamp>, ts: Timestamp) -> Option<Timestamp> {
    match latest {
        Some(current) if !is_after(&ts, &current) => Some(current),
        _ => Some(ts),
    }
}
