//! Built-in default constants.
//!
//! Every threshold the reports use lives here under a name, so a deployment
//! can override it from `report5.toml` instead of patching literals.

// ============================================================================
// Server & Storage
// ============================================================================

/// Default HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// Default sled database directory.
pub const STORE_PATH: &str = "./data/report5";

/// Environment variable holding the config file path.
pub const CONFIG_ENV_VAR: &str = "REPORT5_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "report5.toml";

// ============================================================================
// Fleet
// ============================================================================

/// Tanks tracked by a fresh deployment.
pub const TANK_IDS: [&str; 5] = ["425", "417", "191", "401", "435"];

// ============================================================================
// Navigation
// ============================================================================

/// Coalescing delay before a navigation transition lands (ms).
pub const TRANSITION_DELAY_MS: u64 = 300;

/// Idle time after which a navigation session is dropped (s).
pub const SESSION_IDLE_SECS: u64 = 1800;

/// Live navigation sessions kept per process.
pub const MAX_SESSIONS: usize = 1000;

/// How often idle sessions are swept (s).
pub const SESSION_SWEEP_SECS: u64 = 60;

// ============================================================================
// Daily deltas
// ============================================================================

/// Largest gap between representative days still treated as one range.
pub const GAP_DAYS: i64 = 14;

/// Deltas larger than this in magnitude are data-entry or sensor errors.
pub const MAX_JUMP: f64 = 1000.0;

/// Odometer field.
pub const KM_FIELD: &str = "ק\"מ";

/// Engine-hours field.
pub const ENGINE_HOURS_FIELD: &str = "שע\"מ";

// ============================================================================
// Fuel
// ============================================================================

/// Diesel field.
pub const FUEL_FIELD: &str = "סולר";

/// Capacity of a full tank (litres).
pub const FULL_TANK_LITERS: f64 = 1400.0;

// ============================================================================
// Staleness
// ============================================================================

/// A record this many calendar days old is fully stale.
pub const RECORD_MAX_DAYS: i64 = 2;

/// An open issue this many days old is fully stale.
pub const ISSUE_MAX_DAYS: i64 = 28;

// ============================================================================
// Consumption
// ============================================================================

/// Prefix shared by every consumption-ledger field.
pub const CONSUMPTION_PREFIX: &str = "שצל";
