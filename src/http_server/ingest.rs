//! Event intake handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use super::{ApiError, ApiState};
use crate::engine::RouterError;

/// Offers the body to every route.
pub async fn handle_event(State(state): State<ApiState>, body: Bytes) -> Result<Response, ApiError> {
    respond(state.router.handle_event(&body).await)
}

/// Offers the body to a single route.
pub async fn handle_tenant_event(
    State(state): State<ApiState>,
    Path(route): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    respond(state.router.handle_route(&route, &body).await)
}

// Route failures do not make the request fail: the event was accepted and
// every other route handled it.
fn respond(result: Result<(), RouterError>) -> Result<Response, ApiError> {
    match result {
        Ok(()) => Ok((StatusCode::OK, Json(json!({ "status": "accepted" }))).into_response()),
        Err(RouterError::RouteFailures(failures)) => {
            let failures: Vec<_> = failures
                .iter()
                .map(|f| json!({ "route": f.route, "error": f.error.to_string() }))
                .collect();
            Ok((StatusCode::ACCEPTED, Json(json!({ "status": "partial", "failures": failures })))
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}
