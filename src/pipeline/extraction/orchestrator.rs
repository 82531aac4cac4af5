use std::sync::Arc;

use super::parser::parse_extraction_response;
use super::prompt::{build_extraction_prompt, EXTRACTION_SYSTEM_PROMPT};
use crate::models::{Biomarker, ExtractionResult};
use crate::pipeline::llm::LlmClient;
use crate::pipeline::scoring::{normalize_risk, validate_score};
use crate::pipeline::PipelineError;

/// Turns transcript text into a scored biomarker set:
/// prompt → LLM → parse → validate score → normalize risk
pub struct BiomarkerExtractor {
    llm: Arc<dyn LlmClient>,
    model_name: String,
}

impl BiomarkerExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, model_name: &str) -> Self {
        Self {
            llm,
            model_name: model_name.to_string(),
        }
    }

    /// One inference call per report. A malformed response is a `Schema`
    /// error; it is not retried since every call is billed.
    pub fn extract_biomarkers(
        &self,
        text: &str,
        symptoms: &str,
        history: &[Biomarker],
    ) -> Result<ExtractionResult, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::Validation(
                "No report text to extract from".into(),
            ));
        }

        let _span = tracing::info_span!(
            "extract_biomarkers",
            text_chars = text.chars().count(),
            history = history.len(),
        )
        .entered();

        let prompt = build_extraction_prompt(text, symptoms, history);
        let response = self
            .llm
            .generate(&self.model_name, &prompt, EXTRACTION_SYSTEM_PROMPT, &[])?;

        let parsed = parse_extraction_response(&response).inspect_err(|e| {
            tracing::warn!(error = %e, response_chars = response.len(), "Extraction response rejected");
        })?;

        let health_score = validate_score(parsed.model_score, &parsed.biomarkers);
        let risk_level = normalize_risk(parsed.risk_label.as_deref(), health_score);

        let result = ExtractionResult {
            biomarkers: parsed.biomarkers,
            health_score,
            risk_level,
            summary: parsed.summary,
        };
        tracing::info!(
            biomarkers = result.biomarkers.len(),
            flagged = result.flagged().count(),
            skipped = parsed.skipped,
            health_score,
            risk_level = %risk_level,
            "Biomarkers extracted"
        );
        Ok(result)
    }
}
