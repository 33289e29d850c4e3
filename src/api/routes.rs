//! API route table.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{navigation, reports, status, ApiState};

/// Build the `/api/v1` router.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        // Status records
        .route("/status", post(status::submit_status))
        .route("/tanks", get(status::list_tanks))
        .route("/tanks/:tank_id/latest", get(status::tank_latest))
        .route("/tanks/:tank_id/history", get(status::tank_history))
        // Reports
        .route("/reports/snapshot", get(reports::snapshot))
        .route("/reports/general", get(reports::general))
        .route("/reports/fuel", get(reports::fuel))
        .route("/reports/daily", get(reports::daily))
        .route("/reports/consumption", get(reports::consumption))
        // Navigation sessions (snapshot before the action capture)
        .route("/navigation", post(navigation::create_session))
        .route(
            "/navigation/:id",
            get(navigation::get_session).delete(navigation::delete_session),
        )
        .route("/navigation/:id/snapshot", get(navigation::session_snapshot))
        .route("/navigation/:id/:action", post(navigation::navigate))
        .with_state(state)
}

/// Liveness endpoint at `/health`.
pub fn health_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(status::health))
        .with_state(state)
}
