//! Request error taxonomy and its mapping onto HTTP responses.

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

// ---

/// Terminal failure of a single request.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed body, unknown table name, non-numeric id. Nothing was stored.
    #[error("{0}")]
    InvalidInput(String),

    /// The requested batch or indicator has no rows.
    #[error("{0}")]
    NotFound(String),

    /// The backing store call failed.
    #[error("store failure: {0:#}")]
    StoreFailure(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status();
        let error = match &self {
            AppError::StoreFailure(e) => {
                tracing::error!("Store failure: {:#}", e);
                "Internal server error".to_string()
            }
            other => {
                tracing::debug!("Rejecting request ({}): {}", status, other);
                other.to_string()
            }
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}
