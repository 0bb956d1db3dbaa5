//! API error types and response formatting.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::cache::CacheError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The cache itself failed; upstream source failures never reach here.
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("{0}")]
    NotFound(String),
}

#[derive(Debug, Serialize)]
struct FailureBody {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Cache(err) => {
                tracing::error!(error = %err, "cache operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    FailureBody {
                        success: false,
                        error: Some(err.to_string()),
                        message: None,
                    },
                )
            }
            Self::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                FailureBody {
                    success: false,
                    error: None,
                    message: Some(msg.clone()),
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}
