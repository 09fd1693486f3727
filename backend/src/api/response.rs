//! Error envelope shared by all endpoints
//!
//! Successful responses are plain JSON documents; failures are wrapped as
//! `{"success": false, "error": {"code", "message"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Failure response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse {
    /// Always false for error envelopes
    pub success: bool,
    /// Error details
    pub error: ApiError,
}

/// Error details in API response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ApiResponse {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            error: ApiError {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "BAD_REQUEST" | "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}
