use std::sync::Arc;

use super::cache::TwoTierCache;
use super::parser::parse_followup_response;
use super::prompt::{build_followup_prompt, system_prompt};
use super::signature::compute_signature;
use crate::db::{get_latest_report, Database};
use crate::models::{FollowUpContent, FollowUpItem, FollowUpKind, FollowUpSource};
use crate::pipeline::analysis::validate_user_id;
use crate::pipeline::llm::LlmClient;
use crate::pipeline::PipelineError;

/// Fixed payload when no biomarker is flagged.
pub fn all_clear_items(kind: FollowUpKind) -> Vec<FollowUpItem> {
    let text = match kind {
        FollowUpKind::DoctorQuestions => {
            "All of your results are within range. Ask your doctor how often these tests should be repeated."
        }
        FollowUpKind::ClinicalInsights => {
            "All of your results are within range. Keep up your current routine and recheck at your next scheduled visit."
        }
    };
    vec![FollowUpItem::new(text)]
}

/// Served when generation produced unusable output. Never cached.
pub fn fallback_items(kind: FollowUpKind) -> Vec<FollowUpItem> {
    let text = match kind {
        FollowUpKind::DoctorQuestions => {
            "Which of my flagged results should I be most concerned about, and what are the next steps?"
        }
        FollowUpKind::ClinicalInsights => {
            "Some of your results are outside the reference range. Review them with your doctor to understand what they mean for you."
        }
    };
    vec![FollowUpItem::new(text)]
}

/// Resolves follow-up content for a user's latest report.
///
/// all-clear → local tier → global tier → LLM
pub struct FollowUpService {
    llm: Arc<dyn LlmClient>,
    model_name: String,
    db: Database,
    cache: TwoTierCache,
}

impl FollowUpService {
    pub fn new(llm: Arc<dyn LlmClient>, model_name: &str, db: Database) -> Self {
        Self {
            llm,
            model_name: model_name.to_string(),
            cache: TwoTierCache::new(db.clone()),
            db,
        }
    }

    pub fn generate(
        &self,
        user_id: &str,
        kind: FollowUpKind,
    ) -> Result<FollowUpContent, PipelineError> {
        let user_id = validate_user_id(user_id)?;
        let conn = self.db.open()?;
        let report = get_latest_report(&conn, user_id)?
            .ok_or_else(|| PipelineError::NotFound(format!("No lab report for user {user_id}")))?;
        drop(conn);

        let content = |items, source| FollowUpContent {
            kind,
            items,
            source,
        };

        if !report.biomarkers.iter().any(|b| b.status.is_flagged()) {
            tracing::debug!(report_id = %report.id, %kind, "No flagged biomarkers");
            return Ok(content(all_clear_items(kind), FollowUpSource::AllClear));
        }

        if let Some(items) = self.cache.lookup_local(&report.id, kind)? {
            tracing::debug!(report_id = %report.id, %kind, "Local follow-up cache hit");
            return Ok(content(items, FollowUpSource::LocalCache));
        }

        let signature = compute_signature(kind, &report.biomarkers);
        if let Some(items) = self.cache.lookup(&signature)? {
            tracing::info!(%signature, "Global follow-up cache hit");
            self.cache.record_hit(&signature);
            self.cache.store_local(&report.id, kind, &items)?;
            return Ok(content(items, FollowUpSource::GlobalCache));
        }

        let _span = tracing::info_span!("generate_followup", %kind, %signature).entered();
        let prompt = build_followup_prompt(kind, &report);
        let response = self
            .llm
            .generate(&self.model_name, &prompt, system_prompt(kind), &[])?;

        match parse_followup_response(kind, &response) {
            Ok(items) => {
                self.cache.store(&signature, &items)?;
                self.cache.store_local(&report.id, kind, &items)?;
                tracing::info!(items = items.len(), "Follow-up content generated");
                Ok(content(items, FollowUpSource::Generated))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Follow-up response unusable, serving fallback");
                Ok(content(fallback_items(kind), FollowUpSource::Fallback))
            }
        }
    }
}
