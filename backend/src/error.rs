//! HTTP-facing error type

use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::api::response::ApiResponse;
use crate::registry::RegistryError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(msg: &str) -> Self {
        AppError::NotFound(msg.to_string())
    }

    pub fn bad_request(msg: &str) -> Self {
        AppError::BadRequest(msg.to_string())
    }

    pub fn internal(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }

    /// Machine-readable code carried in the error envelope
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::NotFound(msg) | AppError::BadRequest(msg) | AppError::Internal(msg) => msg,
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidArgument(msg) => AppError::BadRequest(msg),
            RegistryError::UnknownPeer(id) => AppError::NotFound(format!("Peer not found: {}", id)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(msg) = &self {
            tracing::error!("Request failed: {}", msg);
        }
        ApiResponse::error(self.code(), self.message()).into_response()
    }
}
