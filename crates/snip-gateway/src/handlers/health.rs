use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use snip_core::Stats;

use crate::error::Result;
use crate::state::AppState;

/// Storage liveness probe.
pub async fn ping_handler(State(state): State<AppState>) -> Result<StatusCode> {
    state.shortener.health_check().await?;
    Ok(StatusCode::OK)
}

pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<Stats>> {
    Ok(Json(state.shortener.stats().await?))
}
