use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{InferenceError, LlmClient};

/// Ollama HTTP client for LLM inference.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, InferenceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Ollama takes images as base64 strings.
fn encode_images(images: &[Vec<u8>]) -> Vec<String> {
    images
        .iter()
        .map(|image| base64::engine::general_purpose::STANDARD.encode(image))
        .collect()
}

impl LlmClient for OllamaClient {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        images: &[Vec<u8>],
    ) -> Result<String, InferenceError> {
        let url = format!("{}/api/generate", self.base_url);

        let _span = tracing::info_span!(
            "llm_generate",
            model = %model,
            prompt_len = prompt.len(),
            image_count = images.len(),
            image_bytes = images.iter().map(Vec::len).sum::<usize>(),
        )
        .entered();
        let start = std::time::Instant::now();

        let body = OllamaGenerateRequest {
            model,
            prompt,
            system,
            stream: false,
            images: encode_images(images),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    InferenceError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    InferenceError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    InferenceError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            tracing::warn!(?retry_after, "Inference service rate limited us");
            return Err(InferenceError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            response_len = parsed.response.len(),
            "LLM generation complete"
        );

        Ok(parsed.response)
    }
}

/// Mock LLM client for testing. Replays scripted results, then a default.
pub struct MockLlmClient {
    default_response: String,
    scripted: Mutex<VecDeque<Result<String, InferenceError>>>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
    last_images: Mutex<Vec<usize>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            default_response: response.to_string(),
            scripted: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            last_images: Mutex::new(Vec::new()),
        }
    }

    /// Queue a result to be returned before falling back to the default.
    pub fn then(self, result: Result<String, InferenceError>) -> Self {
        if let Ok(mut queue) = self.scripted.lock() {
            queue.push_back(result);
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }

    /// Byte size of each image sent with the most recent call.
    pub fn last_image_sizes(&self) -> Vec<usize> {
        self.last_images.lock().map(|sizes| sizes.clone()).unwrap_or_default()
    }
}

impl LlmClient for MockLlmClient {
    fn generate(
        &self,
        _model: &str,
        prompt: &str,
        _system: &str,
        images: &[Vec<u8>],
    ) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }
        if let Ok(mut last) = self.last_images.lock() {
            *last = images.iter().map(Vec::len).collect();
        }
        let scripted = self
            .scripted
            .lock()
            .map_err(|_| InferenceError::HttpClient("mock lock poisoned".into()))?
            .pop_front();
        scripted.unwrap_or_else(|| Ok(self.default_response.clone()))
    }
}
