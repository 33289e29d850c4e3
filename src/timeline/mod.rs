//! Time navigation over the append-only status log
//!
//! Reconstructs "as-of" views of the fleet by moving a cursor along a line of
//! timestamps:
//! - `ordering`: timestamp comparison and calendar-day helpers
//! - `history`: the ordered, de-duplicated set of visited instants
//! - `navigation`: pure state transitions (changes, days, latest)
//! - `availability`: which controls are enabled, and the UI view
//! - `session`: the hosting cell, stale-fetch tickets, and session expiry

pub mod availability;
pub mod history;
pub mod navigation;
pub mod ordering;
pub mod session;

pub use availability::{Availability, NavigationView};
pub use history::{EntryKind, History, HistoryEntry};
pub use navigation::{NavigationState, Transition};
pub use ordering::{DayClock, FixedClock, LocalClock};
pub use session::{FetchTicket, NavigationSession, SessionLimits, SessionRegistry};
