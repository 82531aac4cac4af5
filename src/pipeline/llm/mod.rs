//! Inference service contract.
//!
//! The pipeline only needs `generate(prompt, page images) → text`.
//! Errors keep one structured signal, upstream rate limiting (HTTP 429),
//! which the pipeline re-raises as its own rate-limit error.

pub mod ollama;

pub use ollama::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Inference service is not reachable at {0}")]
    Connection(String),

    #[error("Inference service rate limited the request")]
    RateLimited { retry_after: Option<u64> },

    #[error("Inference service returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

/// Uploaded document before any conversion for the inference service.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// LLM client abstraction (allows mocking)
///
/// `images` are encoded raster images (PNG, JPEG, ...). PDFs are rendered
/// to pages before they get here.
pub trait LlmClient: Send + Sync {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        images: &[Vec<u8>],
    ) -> Result<String, InferenceError>;
}
