use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::biomarker::{Biomarker, ExtractionResult};
use super::enums::RiskLevel;

/// A persisted extraction result, owned by one user.
///
/// The most recent report per user anchors the local follow-up cache
/// and supplies history for the next extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabReport {
    pub id: Uuid,
    pub user_id: String,
    pub created_at: NaiveDateTime,
    pub health_score: f64,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub symptoms: String,
    pub biomarkers: Vec<Biomarker>,
}

impl LabReport {
    pub fn from_extraction(user_id: &str, symptoms: &str, result: ExtractionResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            created_at: chrono::Utc::now().naive_utc(),
            health_score: result.health_score,
            risk_level: result.risk_level,
            summary: result.summary,
            symptoms: symptoms.to_string(),
            biomarkers: result.biomarkers,
        }
    }
}
