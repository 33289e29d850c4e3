//! API handlers
//!
//! Handlers share one [`ApiState`]; every success goes through
//! [`ApiResponse`](super::envelope::ApiResponse) and every failure through
//! [`ApiError`](super::error::ApiError).

pub mod navigation;
pub mod reports;
pub mod status;

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ReportConfig;
use crate::storage::StatusStore;
use crate::timeline::{DayClock, SessionLimits, SessionRegistry};
use crate::types::{TankId, Timestamp};

use super::error::ApiError;

/// Shared state for all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn StatusStore>,
    pub config: Arc<ReportConfig>,
    pub clock: Arc<dyn DayClock>,
    /// Live navigation sessions
    pub sessions: Arc<SessionRegistry>,
}

impl ApiState {
    pub fn new(
        store: Arc<dyn StatusStore>,
        config: Arc<ReportConfig>,
        clock: Arc<dyn DayClock>,
    ) -> Self {
        let navigation = &config.navigation;
        let delay = Duration::from_millis(navigation.transition_delay_ms);
        let limits = SessionLimits {
            idle_timeout: Duration::from_secs(navigation.session_idle_secs),
            max_sessions: navigation.max_sessions,
        };
        Self {
            sessions: Arc::new(SessionRegistry::new(clock.clone(), delay, limits)),
            store,
            config,
            clock,
        }
    }

    /// Configured tanks in report row order.
    pub fn tanks(&self) -> Vec<TankId> {
        self.config.fleet.tanks.iter().map(|t| TankId::from(t.as_str())).collect()
    }
}

/// `?at=SECONDS[.FRACTION]` (or RFC 3339); absent means latest.
#[derive(Debug, Default, Deserialize)]
pub struct AtQuery {
    pub at: Option<String>,
    /// Comma-separated field names to summarize (snapshot only)
    pub fields: Option<String>,
}

impl AtQuery {
    pub fn at(&self) -> Result<Option<Timestamp>, ApiError> {
        parse_optional(self.at.as_deref())
    }

    pub fn fields(&self) -> Vec<String> {
        self.fields
            .as_deref()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub(crate) fn parse_optional(raw: Option<&str>) -> Result<Option<Timestamp>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Ok(Some(raw.parse()?)),
    }
}
