//! Status record endpoints: health, submission, per-tank lookups

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{parse_optional, ApiState, AtQuery};
use crate::api::envelope::ApiResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::types::{NewStatus, TankId, Timestamp};

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    /// `None` when the store could not be counted
    pub records: Option<usize>,
    pub sessions: usize,
}

/// GET /health
pub async fn health(State(state): State<ApiState>) -> Response {
    let records = state.store.count().await.ok();
    ApiResponse::ok(HealthResponse {
        status: if records.is_some() { "ok" } else { "degraded" },
        backend: state.store.backend_name(),
        records,
        sessions: state.sessions.len().await,
    })
}

// ============================================================================
// Submission
// ============================================================================

/// POST /api/v1/status
///
/// The server assigns the timestamp.
pub async fn submit_status(
    State(state): State<ApiState>,
    Json(status): Json<NewStatus>,
) -> ApiResult {
    if !state.config.fleet.tanks.iter().any(|t| t == status.tank_id.as_str()) {
        return Err(ApiError::BadRequest(format!("unknown tank '{}'", status.tank_id)));
    }
    let record = state.store.submit(status).await?;
    info!(
        tank_id = %record.tank_id,
        timestamp = %record.timestamp,
        fields = record.fields.len(),
        "Status record submitted"
    );
    Ok(ApiResponse::created(record))
}

// ============================================================================
// Tanks
// ============================================================================

/// GET /api/v1/tanks
pub async fn list_tanks(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.tanks())
}

/// GET /api/v1/tanks/:tank_id/latest?at=
pub async fn tank_latest(
    State(state): State<ApiState>,
    Path(tank_id): Path<String>,
    Query(query): Query<AtQuery>,
) -> ApiResult {
    let tank = TankId::from(tank_id);
    let at = query.at()?;
    match state.store.latest_at_or_before(&tank, at).await? {
        Some(record) => Ok(ApiResponse::ok(record)),
        None => Err(ApiError::NotFound(match at {
            Some(at) => format!("no record for tank {tank} at or before {at}"),
            None => format!("no record for tank {tank}"),
        })),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// GET /api/v1/tanks/:tank_id/history?from=&to=
pub async fn tank_history(
    State(state): State<ApiState>,
    Path(tank_id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> ApiResult {
    let tank = TankId::from(tank_id);
    let from = parse_optional(query.from.as_deref())?.unwrap_or(Timestamp::MIN);
    let to = parse_optional(query.to.as_deref())?.unwrap_or(Timestamp::MAX);
    if from > to {
        return Err(ApiError::BadRequest("'from' is after 'to'".to_string()));
    }
    let records = state.store.range(&tank, from, to).await?;
    Ok(ApiResponse::ok(records))
}
