use serde::{Deserialize, Serialize};

use super::enums::{BiomarkerStatus, RiskLevel};

/// One measured analyte from a lab report, after status normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Biomarker {
    pub name: String,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub reference_min: Option<f64>,
    pub reference_max: Option<f64>,
    pub status: BiomarkerStatus,
    pub category: Option<String>,
    pub confidence: f32,
    pub interpretation: String,
}

/// Validated output of the structured extractor for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub biomarkers: Vec<Biomarker>,
    pub health_score: f64,
    pub risk_level: RiskLevel,
    pub summary: String,
}

impl ExtractionResult {
    pub fn flagged(&self) -> impl Iterator<Item = &Biomarker> {
        self.biomarkers.iter().filter(|b| b.status.is_flagged())
    }
}
