//! Authenticated management endpoints.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use super::{ApiError, ApiState};

/// Reloads routes, outputs and templates from their files.
pub async fn reload(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    state.router.reload_config().await?;
    Ok((StatusCode::OK, Json(json!({ "status": "reloaded", "routes": state.router.route_names() }))))
}

/// Returns the recent-events log, oldest first.
pub async fn recent_events(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let events = state.router.recent_events().await;
    Ok((StatusCode::OK, Json(json!({ "events": events }))))
}

/// Returns delivery counts per output.
pub async fn stats(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let deliveries = state.store.get_delivery_counts().await?;
    Ok((StatusCode::OK, Json(json!({ "deliveries": deliveries }))))
}
