pub mod analysis;
pub mod extraction;
pub mod followup;
pub mod llm;
pub mod pdf;
pub mod scoring;
pub mod transcribe;

use thiserror::Error;

use crate::db::DatabaseError;
use llm::InferenceError;
use pdf::RenderError;

/// Cooldown reported when the inference service sends 429 without a hint.
const UPSTREAM_RETRY_AFTER_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Document appears to be image-based ({chars} characters recovered)")]
    ImageBasedDocument { chars: usize },

    #[error("Model output failed validation: {0}")]
    Schema(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Inference service failure: {0}")]
    Inference(InferenceError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("PDF rendering failure: {0}")]
    Rendering(RenderError),
}

impl From<InferenceError> for PipelineError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::RateLimited { retry_after } => PipelineError::RateLimitExceeded {
                retry_after: retry_after.unwrap_or(UPSTREAM_RETRY_AFTER_SECS),
            },
            other => PipelineError::Inference(other),
        }
    }
}

/// Unreadable or locked PDFs are the caller's problem; the rest are ours.
impl From<RenderError> for PipelineError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Encrypted => {
                PipelineError::Validation("PDF is password-protected".into())
            }
            RenderError::InvalidPdf(reason) => {
                PipelineError::Validation(format!("PDF could not be read: {reason}"))
            }
            other => PipelineError::Rendering(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_429_becomes_rate_limit() {
        let err: PipelineError = InferenceError::RateLimited { retry_after: Some(12) }.into();
        assert!(matches!(err, PipelineError::RateLimitExceeded { retry_after: 12 }));

        let err: PipelineError = InferenceError::RateLimited { retry_after: None }.into();
        assert!(matches!(
            err,
            PipelineError::RateLimitExceeded { retry_after: UPSTREAM_RETRY_AFTER_SECS }
        ));
    }

    #[test]
    fn other_inference_errors_stay_infrastructure() {
        let err: PipelineError = InferenceError::Connection("http://x".into()).into();
        assert!(matches!(err, PipelineError::Inference(_)));
    }

    #[test]
    fn bad_pdfs_are_validation_errors() {
        let err: PipelineError = RenderError::Encrypted.into();
        assert!(matches!(err, PipelineError::Validation(_)));

        let err: PipelineError = RenderError::InvalidPdf("no trailer".into()).into();
        assert!(matches!(err, PipelineError::Validation(_)));

        let err: PipelineError = RenderError::LibraryUnavailable("missing".into()).into();
        assert!(matches!(err, PipelineError::Rendering(_)));
    }
}
