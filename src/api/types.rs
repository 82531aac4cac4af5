//! Shared state and response envelope for the HTTP layer.

use std::sync::Arc;

use serde::Serialize;

use crate::admission::{AdmissionController, SqliteQuotaStore};
use crate::config::ServiceConfig;
use crate::db::Database;
use crate::pipeline::analysis::LabAnalyzer;
use crate::pipeline::followup::FollowUpService;
use crate::pipeline::llm::LlmClient;
use crate::pipeline::pdf::{PdfPageRenderer, PdfiumRenderer};

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
///
/// Holds no mutable state of its own: quotas, reports and caches all live
/// in the database.
#[derive(Clone)]
pub struct ApiContext {
    pub config: Arc<ServiceConfig>,
    pub db: Database,
    pub llm: Arc<dyn LlmClient>,
    pub renderer: Arc<dyn PdfPageRenderer>,
    pub admission: Arc<AdmissionController<SqliteQuotaStore>>,
}

impl ApiContext {
    pub fn new(config: ServiceConfig, db: Database, llm: Arc<dyn LlmClient>) -> Self {
        let admission = AdmissionController::new(SqliteQuotaStore::new(db.clone()), config.windows());
        Self {
            config: Arc::new(config),
            db,
            llm,
            renderer: Arc::new(PdfiumRenderer),
            admission: Arc::new(admission),
        }
    }

    /// Replace the PDFium page renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn PdfPageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn analyzer(&self) -> LabAnalyzer {
        LabAnalyzer::new(
            self.llm.clone(),
            self.renderer.clone(),
            &self.config,
            self.db.clone(),
        )
    }

    pub fn followups(&self) -> FollowUpService {
        FollowUpService::new(self.llm.clone(), &self.config.model, self.db.clone())
    }
}

// ═══════════════════════════════════════════════════════════
// Success envelope
// ═══════════════════════════════════════════════════════════

/// `{ "success": true, "data": ... }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shape() {
        let json = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": [1, 2]}));
    }
}
