//! Report Configuration Module
//!
//! Deployment configuration loaded from TOML, replacing every report
//! threshold with an operator-tunable value.
//!
//! ## Loading Order
//!
//! 1. `REPORT5_CONFIG` environment variable (path to TOML file)
//! 2. `report5.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! The loaded config is shared as `Arc<ReportConfig>` with the API state;
//! there is no global.

mod report_config;
pub mod defaults;

pub use report_config::*;
