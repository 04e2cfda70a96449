use crate::security::Forbidden;
use crate::tree::TraversalError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Forbidden.")]
    Forbidden(#[source] Forbidden),
    #[error("Not found.")]
    NotFound,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("directory tree is too deep (limit {limit})")]
    DepthExceeded { limit: usize },
    #[error("filesystem cycle detected")]
    CycleDetected,
    #[error("directory tree has too many entries (limit {limit})")]
    TooManyEntries { limit: usize },
    #[error("listing timed out")]
    Timeout,
    #[error("listing cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Forbidden(_) => "Forbidden",
            AppError::NotFound => "NotFound",
            AppError::BadRequest(_) => "BadRequest",
            AppError::DepthExceeded { .. } => "DepthExceeded",
            AppError::CycleDetected => "CycleDetected",
            AppError::TooManyEntries { .. } => "TooManyEntries",
            AppError::Timeout => "Timeout",
            AppError::Cancelled => "Cancelled",
            AppError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DepthExceeded { .. }
            | AppError::CycleDetected
            | AppError::TooManyEntries { .. }
            | AppError::Cancelled
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody { error: self.code(), message: self.to_string() }
    }
}

impl From<Forbidden> for AppError {
    fn from(f: Forbidden) -> Self {
        AppError::Forbidden(f)
    }
}

impl From<TraversalError> for AppError {
    fn from(e: TraversalError) -> Self {
        match e {
            TraversalError::DepthExceeded { limit } => AppError::DepthExceeded { limit },
            TraversalError::CycleDetected { .. } => AppError::CycleDetected,
            TraversalError::TooManyEntries { limit } => AppError::TooManyEntries { limit },
            TraversalError::Cancelled => AppError::Cancelled,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
