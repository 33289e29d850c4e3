//! Report 5: tank status reporting with time navigation
//!
//! Soldiers submit per-tank status records; commanders read fleet reports
//! reconstructed as of any instant.
//!
//! ## Architecture
//!
//! - **Storage**: append-only per-tank status log behind [`StatusStore`]
//! - **Timeline**: navigation over changes and calendar days, with stale
//!   fetch detection
//! - **Reports**: snapshot, daily deltas, fuel, consumption, staleness
//! - **API**: Axum HTTP surface with a uniform JSON envelope

pub mod api;
pub mod config;
pub mod reports;
pub mod storage;
pub mod timeline;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, ReportConfig};

// Re-export commonly used types
pub use types::{FieldValue, Issue, NewStatus, StatusRecord, TankId, Timestamp};

// Re-export storage
pub use storage::{InMemoryStore, SledStatusStore, StatusStore, StoreError};

// Re-export navigation
pub use timeline::{
    DayClock, FixedClock, LocalClock, NavigationSession, NavigationState, NavigationView,
    SessionLimits, SessionRegistry, Transition,
};
