//! API error type and the `{success:false, ...}` envelope.

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::DatabaseError;
use crate::pipeline::pdf::RenderError;
use crate::pipeline::PipelineError;

/// Error body shared by every failing route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Request body too large")]
    PayloadTooLarge,
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Document is image-based")]
    ImageBasedDocument { chars: usize },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Model output invalid: {0}")]
    Schema(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", detail.clone())
            }
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                "Request body exceeds the upload limit".to_string(),
            ),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Rate limit exceeded. Retry after {retry_after}s"),
            ),
            ApiError::ImageBasedDocument { chars } => {
                tracing::info!(chars, "Image-based document rejected");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "IMAGE_BASED_DOCUMENT",
                    "Too little text could be read from this document. Please enter the results manually."
                        .to_string(),
                )
            }
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::Schema(detail) => {
                tracing::error!(detail, "Model output failed validation");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EXTRACTION_FAILED",
                    "The report could not be analyzed".to_string(),
                )
            }
            ApiError::Unavailable(detail) => {
                tracing::error!(detail, "Dependency unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "A required service is temporarily unavailable".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, error) = self.parts();
        let retry_after = match &self {
            ApiError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };

        let body = ErrorBody {
            success: false,
            error,
            code,
            status: status.as_u16(),
            retry_after,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(val) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(detail) => ApiError::BadRequest(detail),
            PipelineError::RateLimitExceeded { retry_after } => ApiError::RateLimited { retry_after },
            PipelineError::ImageBasedDocument { chars } => ApiError::ImageBasedDocument { chars },
            PipelineError::Schema(detail) => ApiError::Schema(detail),
            PipelineError::NotFound(detail) => ApiError::NotFound(detail),
            PipelineError::Inference(e) => ApiError::Unavailable(e.to_string()),
            PipelineError::Database(e) => ApiError::Unavailable(e.to_string()),
            PipelineError::Rendering(e @ RenderError::LibraryUnavailable(_)) => {
                ApiError::Unavailable(e.to_string())
            }
            PipelineError::Rendering(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        ApiError::Unavailable(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task failed: {err}"))
    }
}
