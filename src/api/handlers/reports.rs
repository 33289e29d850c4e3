//! Report endpoints: snapshot, general, fuel, daily deltas, consumption

use axum::extract::{Query, State};

use super::{ApiState, AtQuery};
use crate::api::envelope::ApiResponse;
use crate::api::error::ApiResult;
use crate::reports::consumption::load_consumption_ledger;
use crate::reports::daily::{load_daily_report, DeltaRules};
use crate::reports::fuel::load_fuel_report;
use crate::reports::snapshot::load_snapshot_report;
use crate::reports::staleness::load_general_report;

/// GET /api/v1/reports/snapshot?at=&fields=a,b
pub async fn snapshot(State(state): State<ApiState>, Query(query): Query<AtQuery>) -> ApiResult {
    let at = query.at()?;
    let report = load_snapshot_report(
        state.store.as_ref(),
        &state.tanks(),
        at,
        &query.fields(),
        state.clock.as_ref(),
    )
    .await?;
    Ok(ApiResponse::ok(report))
}

/// GET /api/v1/reports/general?at=
pub async fn general(State(state): State<ApiState>, Query(query): Query<AtQuery>) -> ApiResult {
    let at = query.at()?;
    let report = load_general_report(
        state.store.as_ref(),
        &state.tanks(),
        at,
        &state.config.staleness,
        state.clock.as_ref(),
    )
    .await?;
    Ok(ApiResponse::ok(report))
}

/// GET /api/v1/reports/fuel?at=
pub async fn fuel(State(state): State<ApiState>, Query(query): Query<AtQuery>) -> ApiResult {
    let at = query.at()?;
    let report =
        load_fuel_report(state.store.as_ref(), &state.tanks(), at, &state.config.fuel).await?;
    Ok(ApiResponse::ok(report))
}

/// GET /api/v1/reports/daily
pub async fn daily(State(state): State<ApiState>) -> ApiResult {
    let rules = DeltaRules::from(&state.config.deltas);
    let report =
        load_daily_report(state.store.as_ref(), &state.tanks(), &rules, state.clock.as_ref())
            .await?;
    Ok(ApiResponse::ok(report))
}

/// GET /api/v1/reports/consumption
pub async fn consumption(State(state): State<ApiState>) -> ApiResult {
    let ledger = load_consumption_ledger(
        state.store.as_ref(),
        &state.config.consumption,
        state.clock.as_ref(),
    )
    .await?;
    Ok(ApiResponse::ok(ledger))
}
