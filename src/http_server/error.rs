//! Defines the custom `ApiError` type for the HTTP server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::{engine::RouterError, persistence::error::PersistenceError};

/// A custom error type for the API that can be converted into an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    /// Represents an unauthorized request.
    Unauthorized,

    /// The payload could not be used.
    BadRequest(String),

    /// Represents a resource that could not be found.
    NotFound(String),

    /// The new configuration was rejected.
    UnprocessableEntity(String),

    /// Represents a generic internal server error.
    InternalServerError(String),
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        ApiError::InternalServerError(err.to_string())
    }
}

impl From<RouterError> for ApiError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::MalformedInput(e) => ApiError::BadRequest(e.to_string()),
            RouterError::RouteNotFound(route) => {
                ApiError::NotFound(format!("Route '{route}' not found"))
            }
            RouterError::Source(_) | RouterError::Config(_) | RouterError::InvalidPolicy { .. } => {
                ApiError::UnprocessableEntity(err.to_string())
            }
            RouterError::RouteFailures(_) => ApiError::InternalServerError(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" }))
            }
            ApiError::InternalServerError(err) => {
                tracing::error!("Internal server error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "An internal server error occurred" }),
                )
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            ApiError::UnprocessableEntity(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": message }))
            }
        };

        (status, Json(body)).into_response()
    }
}
