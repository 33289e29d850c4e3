use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),
    #[error("config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, toml::de::Error),
    #[error("config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a Report 5 deployment.
///
/// Load with `ReportConfig::load()` which searches:
/// 1. `$REPORT5_CONFIG` env var
/// 2. `./report5.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub fleet: FleetConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub deltas: DeltaConfig,
    #[serde(default)]
    pub fuel: FuelConfig,
    #[serde(default)]
    pub staleness: StalenessConfig,
    #[serde(default)]
    pub consumption: ConsumptionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: defaults::SERVER_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sled,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sled,
            path: PathBuf::from(defaults::STORE_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Tank ids in report row order
    pub tanks: Vec<String>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            tanks: defaults::TANK_IDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Coalescing delay before each transition lands; 0 disables it
    pub transition_delay_ms: u64,
    /// Sessions untouched this long are dropped; 0 keeps them until evicted
    pub session_idle_secs: u64,
    /// Creating a session beyond this evicts the least recently used one
    pub max_sessions: usize,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            transition_delay_ms: defaults::TRANSITION_DELAY_MS,
            session_idle_secs: defaults::SESSION_IDLE_SECS,
            max_sessions: defaults::MAX_SESSIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaConfig {
    /// Largest gap (days) between representative days inside one range
    pub gap_days: i64,
    /// Deltas with a larger magnitude are dropped
    pub max_jump: f64,
    pub km_field: String,
    pub engine_hours_field: String,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            gap_days: defaults::GAP_DAYS,
            max_jump: defaults::MAX_JUMP,
            km_field: defaults::KM_FIELD.to_string(),
            engine_hours_field: defaults::ENGINE_HOURS_FIELD.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuelConfig {
    pub fuel_field: String,
    pub full_tank_liters: f64,
}

impl Default for FuelConfig {
    fn default() -> Self {
        Self {
            fuel_field: defaults::FUEL_FIELD.to_string(),
            full_tank_liters: defaults::FULL_TANK_LITERS,
        }
    }
}

/// One summand of a fill-level indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorTerm {
    pub field: String,
    /// Multiplier applied to the field value (booleans count as 1)
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Upper clamp applied to the raw field value before weighting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<f64>,
}

fn default_weight() -> f64 {
    1.0
}

impl IndicatorTerm {
    fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            weight: 1.0,
            cap: None,
        }
    }

    fn weighted(field: &str, weight: f64) -> Self {
        Self {
            weight,
            ..Self::new(field)
        }
    }

    fn capped(field: &str, cap: f64) -> Self {
        Self {
            cap: Some(cap),
            ..Self::new(field)
        }
    }
}

/// A fill-level cell: red when the summed terms sit at `min`, clear at `max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub name: String,
    #[serde(default)]
    pub min: f64,
    pub max: f64,
    pub terms: Vec<IndicatorTerm>,
}

impl IndicatorConfig {
    fn new(name: &str, max: f64, terms: Vec<IndicatorTerm>) -> Self {
        Self {
            name: name.to_string(),
            min: 0.0,
            max,
            terms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StalenessConfig {
    /// Age (calendar days) at which a record is fully stale
    pub record_max_days: i64,
    /// Age (calendar days) at which an open issue is fully stale
    pub issue_max_days: i64,
    pub indicators: Vec<IndicatorConfig>,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        use IndicatorTerm as T;
        Self {
            record_max_days: defaults::RECORD_MAX_DAYS,
            issue_max_days: defaults::ISSUE_MAX_DAYS,
            indicators: vec![
                IndicatorConfig::new("סולר", 1400.0, vec![T::new("סולר")]),
                IndicatorConfig::new(
                    "מים",
                    2.0 * 20.0 + 2.0 * 1.5,
                    vec![
                        T::weighted("מים (ג'ריקנים)", 20.0),
                        T::weighted("מים (שישיות)", 1.5),
                    ],
                ),
                IndicatorConfig::new("מנ\"קים", 2.0, vec![T::new("מנ\"קים")]),
                IndicatorConfig::new(
                    "סוללות",
                    4.0,
                    vec![T::new("סוללות AA"), T::new("סוללות AAA"), T::new("סוללות פטמה")],
                ),
                IndicatorConfig::new(
                    "שמנים",
                    6.0,
                    vec![
                        T::new("שמן 2510"),
                        T::new("שמן 2640"),
                        T::new("שמן 9040"),
                        T::new("שמן 9105"),
                    ],
                ),
                IndicatorConfig::new(
                    "חח",
                    5.0 + 10.0 + 20.0,
                    vec![T::new("חוליות"), T::new("פינים"), T::new("טבעות")],
                ),
                IndicatorConfig::new(
                    "פקלים",
                    2.0,
                    vec![T::new("ערכת עזרה ראשונה"), T::new("פק\"ל היגיינה")],
                ),
                IndicatorConfig::new(
                    "תחמושת",
                    39.0 + 100.0,
                    vec![T::capped("ברוס מאג 7.62", 39.0), T::capped("כדורי 0.5", 100.0)],
                ),
                IndicatorConfig::new(
                    "כשירות וקישוריות",
                    2.0,
                    vec![T::new("כשירות (GPS)"), T::new("קישוריות (WIFI)")],
                ),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumptionConfig {
    pub field_prefix: String,
}

impl Default for ConsumptionConfig {
    fn default() -> Self {
        Self {
            field_prefix: defaults::CONSUMPTION_PREFIX.to_string(),
        }
    }
}

// ============================================================================
// Loading & Validation
// ============================================================================

impl ReportConfig {
    /// Load configuration using the standard search order:
    /// 1. `$REPORT5_CONFIG` environment variable
    /// 2. `./report5.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// A file that fails to parse or validate is logged and skipped.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), tanks = config.fleet.tanks.len(), "Loaded config from REPORT5_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from REPORT5_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "REPORT5_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(tanks = config.fleet.tanks.len(), "Loaded config from ./report5.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./report5.toml, using defaults");
                }
            }
        }

        info!("No report5.toml found, using built-in defaults");
        Self::default()
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Collect every violation rather than stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.server.addr.parse::<SocketAddr>().is_err() {
            errors.push(format!("server.addr '{}' is not a socket address", self.server.addr));
        }

        if self.store.backend == StoreBackend::Sled && self.store.path.as_os_str().is_empty() {
            errors.push("store.path must be set for the sled backend".to_string());
        }

        if self.fleet.tanks.is_empty() {
            errors.push("fleet.tanks must list at least one tank".to_string());
        }
        let mut seen = HashSet::new();
        for tank in &self.fleet.tanks {
            if tank.trim().is_empty() {
                errors.push("fleet.tanks contains an empty id".to_string());
            } else if tank.contains('\0') {
                errors.push(format!("fleet.tanks id {:?} contains a NUL byte", tank));
            } else if !seen.insert(tank.as_str()) {
                errors.push(format!("fleet.tanks lists '{}' more than once", tank));
            }
        }

        if self.navigation.transition_delay_ms > 10_000 {
            errors.push(format!(
                "navigation.transition_delay_ms ({}) must be at most 10000",
                self.navigation.transition_delay_ms
            ));
        }
        if self.navigation.max_sessions == 0 {
            errors.push("navigation.max_sessions must be at least 1".to_string());
        }

        let d = &self.deltas;
        if d.gap_days < 1 {
            errors.push(format!("deltas.gap_days ({}) must be at least 1", d.gap_days));
        }
        if !(d.max_jump > 0.0) {
            errors.push(format!("deltas.max_jump ({}) must be positive", d.max_jump));
        }
        if d.km_field.is_empty() || d.engine_hours_field.is_empty() {
            errors.push("deltas.km_field and deltas.engine_hours_field must be set".to_string());
        } else if d.km_field == d.engine_hours_field {
            errors.push("deltas.km_field and deltas.engine_hours_field must differ".to_string());
        }

        if self.fuel.fuel_field.is_empty() {
            errors.push("fuel.fuel_field must be set".to_string());
        }
        if !(self.fuel.full_tank_liters > 0.0) {
            errors.push(format!(
                "fuel.full_tank_liters ({}) must be positive",
                self.fuel.full_tank_liters
            ));
        }

        let s = &self.staleness;
        if s.record_max_days < 1 {
            errors.push(format!(
                "staleness.record_max_days ({}) must be at least 1",
                s.record_max_days
            ));
        }
        if s.issue_max_days < 2 {
            errors.push(format!(
                "staleness.issue_max_days ({}) must be at least 2",
                s.issue_max_days
            ));
        }
        let mut names = HashSet::new();
        for indicator in &s.indicators {
            if !names.insert(indicator.name.as_str()) {
                errors.push(format!("staleness indicator '{}' defined twice", indicator.name));
            }
            if !(indicator.max > indicator.min) {
                errors.push(format!(
                    "staleness indicator '{}': max ({}) must exceed min ({})",
                    indicator.name, indicator.max, indicator.min
                ));
            }
            if indicator.terms.is_empty() {
                errors.push(format!("staleness indicator '{}' has no terms", indicator.name));
            }
        }

        if self.consumption.field_prefix.is_empty() {
            errors.push("consumption.field_prefix must be set".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}
