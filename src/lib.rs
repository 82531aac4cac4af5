pub mod admission;
pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::admission::SqliteQuotaStore;
use crate::api::ApiContext;
use crate::config::{ConfigError, ServiceConfig};
use crate::db::{Database, DatabaseError};
use crate::pipeline::llm::{InferenceError, OllamaClient};
use crate::pipeline::pdf::PdfiumRenderer;

/// Failures that stop the service before it starts serving.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Inference client error: {0}")]
    Inference(#[from] InferenceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the service and block until Ctrl-C.
///
/// The blocking inference client is built and dropped outside the async
/// runtime.
pub fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = ServiceConfig::from_env()?;
    let db = Database::initialize(&config.database_path)?;

    if let Err(e) = SqliteQuotaStore::new(db.clone()).sweep_expired(chrono::Utc::now().timestamp()) {
        tracing::warn!(error = %e, "Quota bucket sweep failed");
    }

    let llm = Arc::new(OllamaClient::new(&config.ollama_url, config.inference_timeout_secs)?);
    tracing::info!(
        url = %config.ollama_url,
        model = %config.model,
        "Inference service configured"
    );

    if let Err(e) = PdfiumRenderer::check_available() {
        tracing::warn!(error = %e, "PDF uploads will fail until PDFium is installed");
    }

    let addr = config.bind_addr;
    let ctx = ApiContext::new(config, db, llm.clone());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(api::serve_until_interrupted(ctx, addr))?;
    drop(runtime);
    drop(llm);

    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
