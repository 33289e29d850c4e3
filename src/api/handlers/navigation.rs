//! Navigation session endpoints
//!
//! A session is the server-side cursor of one report view. Clients create
//! one, step it with actions, and fetch the snapshot at its cursor. A
//! snapshot fetch that is overtaken by another navigation is reported as
//! `409 STALE` instead of returning outdated rows.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{ApiState, AtQuery};
use crate::api::envelope::ApiResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::reports::snapshot::load_snapshot_report;
use crate::reports::{latest_per_tank, max_timestamp};
use crate::timeline::{NavigationSession, NavigationView, Transition};
use crate::types::Timestamp;

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub id: Uuid,
    pub view: NavigationView,
}

#[derive(Debug, Deserialize)]
pub struct GoToBody {
    pub timestamp: Timestamp,
}

async fn find(state: &ApiState, id: &Uuid) -> Result<Arc<NavigationSession>, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("navigation session {id} not found")))
}

/// POST /api/v1/navigation
///
/// The new session starts on the newest record across the fleet; with an
/// empty store it starts uninitialized.
pub async fn create_session(State(state): State<ApiState>) -> ApiResult {
    let latest = latest_per_tank(state.store.as_ref(), &state.tanks(), None).await?;
    let newest = max_timestamp(latest.iter().filter_map(|(_, record)| record.as_ref()));

    let (id, session) = state.sessions.create().await;
    let view = match newest {
        Some(ts) => session.observe(ts).await,
        None => session.view().await,
    };
    Ok(ApiResponse::created(SessionCreated { id, view }))
}

/// GET /api/v1/navigation/:id
pub async fn get_session(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult {
    let session = find(&state, &id).await?;
    Ok(ApiResponse::ok(session.view().await))
}

/// POST /api/v1/navigation/:id/:action
///
/// Actions: `prev-change`, `next-change`, `prev-day`, `next-day`,
/// `current`, and `goto` with body `{"timestamp": {...}}`.
pub async fn navigate(
    State(state): State<ApiState>,
    Path((id, action)): Path<(Uuid, String)>,
    body: Result<Json<GoToBody>, JsonRejection>,
) -> ApiResult {
    let transition = if action == "goto" {
        match body {
            Ok(Json(body)) => Transition::GoTo(body.timestamp),
            Err(JsonRejection::MissingJsonContentType(_)) => {
                return Err(ApiError::BadRequest(
                    "goto requires a JSON body with a timestamp".to_string(),
                ))
            }
            Err(rejection) => {
                return Err(ApiError::BadRequest(format!(
                    "invalid goto body: {}",
                    rejection.body_text()
                )))
            }
        }
    } else {
        action
            .parse::<Transition>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let session = find(&state, &id).await?;
    let view = session.apply(transition).await;
    Ok(ApiResponse::ok(view))
}

/// GET /api/v1/navigation/:id/snapshot?fields=
pub async fn session_snapshot(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Query(query): Query<AtQuery>,
) -> ApiResult {
    let session = find(&state, &id).await?;
    let ticket = session.begin_fetch().await;

    let report = load_snapshot_report(
        state.store.as_ref(),
        &state.tanks(),
        ticket.at,
        &query.fields(),
        state.clock.as_ref(),
    )
    .await?;

    if ticket.at.is_none() {
        // Uninitialized cursor: the fetch resolves "latest" for the session.
        if let Some(ts) = report.max_timestamp {
            session.observe(ts).await;
        }
    } else if !session.complete_fetch(ticket).await {
        debug!(%id, seq = ticket.seq, "Discarding stale snapshot");
        return Err(ApiError::Stale(
            "cursor moved while the snapshot was loading".to_string(),
        ));
    }
    Ok(ApiResponse::ok(report))
}

/// DELETE /api/v1/navigation/:id
pub async fn delete_session(State(state): State<ApiState>, Path(id): Path<Uuid>) -> ApiResult {
    if state.sessions.remove(&id).await {
        Ok(ApiResponse::ok(serde_json::json!({ "deleted": id })))
    } else {
        Err(ApiError::NotFound(format!("navigation session {id} not found")))
    }
}
