//! End-to-end report analysis: validate → transcribe → extract → persist.

use std::sync::Arc;

use super::extraction::BiomarkerExtractor;
use super::llm::{DocumentPayload, LlmClient};
use super::pdf::PdfPageRenderer;
use super::transcribe::{ensure_text_yield, DocumentTranscriber};
use super::PipelineError;
use crate::config::ServiceConfig;
use crate::db::{get_latest_report, insert_lab_report, Database};
use crate::models::LabReport;

pub const MIN_TEXT_CHARS: usize = 10;
pub const MAX_TEXT_CHARS: usize = 100_000;
pub const MAX_USER_ID_CHARS: usize = 128;

/// Where the report content comes from.
#[derive(Debug, Clone)]
pub enum ReportSource {
    /// Uploaded PDF or image, transcribed by the inference service.
    Document(DocumentPayload),
    /// Manually entered report text.
    Text(String),
}

#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub user_id: String,
    pub source: ReportSource,
    pub symptoms: String,
}

pub struct LabAnalyzer {
    db: Database,
    transcriber: DocumentTranscriber,
    extractor: BiomarkerExtractor,
    min_transcript_chars: usize,
}

impl LabAnalyzer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        renderer: Arc<dyn PdfPageRenderer>,
        config: &ServiceConfig,
        db: Database,
    ) -> Self {
        Self {
            db,
            transcriber: DocumentTranscriber::new(
                llm.clone(),
                renderer,
                &config.model,
                config.max_document_bytes,
            ),
            extractor: BiomarkerExtractor::new(llm, &config.model),
            min_transcript_chars: config.min_transcript_chars,
        }
    }

    /// Analyze one report and persist it as the user's latest.
    ///
    /// The previous report, if any, is passed to extraction as history.
    pub fn analyze(&self, input: &AnalysisInput) -> Result<LabReport, PipelineError> {
        let user_id = validate_user_id(&input.user_id)?;

        let text = match &input.source {
            ReportSource::Document(document) => {
                let text = self.transcriber.transcribe(document)?;
                ensure_text_yield(&text, self.min_transcript_chars)?;
                text
            }
            ReportSource::Text(text) => validate_raw_text(text)?.to_string(),
        };

        let history = get_latest_report(&self.db.open()?, user_id)?
            .map(|previous| previous.biomarkers)
            .unwrap_or_default();

        let result = self
            .extractor
            .extract_biomarkers(&text, &input.symptoms, &history)?;
        let report = LabReport::from_extraction(user_id, input.symptoms.trim(), result);
        insert_lab_report(&self.db.open()?, &report)?;

        tracing::info!(
            report_id = %report.id,
            biomarkers = report.biomarkers.len(),
            health_score = report.health_score,
            "Lab report stored"
        );
        Ok(report)
    }
}

/// Trimmed user id, non-empty and at most `MAX_USER_ID_CHARS` long.
pub fn validate_user_id(user_id: &str) -> Result<&str, PipelineError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(PipelineError::Validation("userId is required".into()));
    }
    if user_id.chars().count() > MAX_USER_ID_CHARS {
        return Err(PipelineError::Validation(format!(
            "userId exceeds {MAX_USER_ID_CHARS} characters"
        )));
    }
    Ok(user_id)
}

/// Trimmed manual-entry text, bounded to `[MIN_TEXT_CHARS, MAX_TEXT_CHARS]`.
pub fn validate_raw_text(text: &str) -> Result<&str, PipelineError> {
    let text = text.trim();
    let chars = text.chars().count();
    if chars < MIN_TEXT_CHARS {
        return Err(PipelineError::Validation(format!(
            "Report text must be at least {MIN_TEXT_CHARS} characters"
        )));
    }
    if chars > MAX_TEXT_CHARS {
        return Err(PipelineError::Validation(format!(
            "Report text must be at most {MAX_TEXT_CHARS} characters"
        )));
    }
    Ok(text)
}
