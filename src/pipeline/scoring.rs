//! Health score validation and status/risk normalization.
//!
//! All functions here are pure and total: any model output, however
//! malformed, maps to a well-formed value.

use crate::models::{Biomarker, BiomarkerStatus, RiskLevel};

const OPTIMAL_WEIGHT: f64 = 100.0;
const WARNING_WEIGHT: f64 = 75.0;
const CRITICAL_WEIGHT: f64 = 40.0;

/// Floor when at least one biomarker is optimal.
const FLOOR_WITH_OPTIMAL: f64 = 50.0;
/// Floor when nothing is optimal.
const FLOOR_WITHOUT_OPTIMAL: f64 = 30.0;

/// Map a free-text model status onto the three-value scale.
///
/// Case-insensitive and whitespace-trimmed. Unknown labels become
/// `Warning`: an unrecognized status still needs attention.
pub fn normalize_status(raw: &str) -> BiomarkerStatus {
    match raw.trim().to_lowercase().as_str() {
        "normal" | "optimal" | "stable" | "within range" => BiomarkerStatus::Optimal,
        "warning" | "monitor" | "borderline" | "elevated" => BiomarkerStatus::Warning,
        "critical" | "high" | "low" | "action required" | "abnormal" => BiomarkerStatus::Critical,
        _ => BiomarkerStatus::Warning,
    }
}

/// Keep a plausible model score, otherwise recompute from statuses.
///
/// A score is implausible when absent, zero, NaN, or outside `[0, 100]`.
pub fn validate_score(model_score: Option<f64>, biomarkers: &[Biomarker]) -> f64 {
    match model_score {
        Some(score) if score.is_finite() && score > 0.0 && score <= 100.0 => score,
        _ => {
            let recomputed = compute_score(biomarkers);
            tracing::debug!(?model_score, recomputed, "Model health score replaced");
            recomputed
        }
    }
}

/// Deterministic score from biomarker statuses.
pub fn compute_score(biomarkers: &[Biomarker]) -> f64 {
    let total = biomarkers.len();
    if total == 0 {
        return 0.0;
    }

    let (mut optimal, mut warning, mut critical) = (0usize, 0usize, 0usize);
    for b in biomarkers {
        match b.status {
            BiomarkerStatus::Optimal => optimal += 1,
            BiomarkerStatus::Warning => warning += 1,
            BiomarkerStatus::Critical => critical += 1,
        }
    }

    let raw = (optimal as f64 * OPTIMAL_WEIGHT
        + warning as f64 * WARNING_WEIGHT
        + critical as f64 * CRITICAL_WEIGHT)
        / total as f64;
    let floor = if optimal > 0 {
        FLOOR_WITH_OPTIMAL
    } else {
        FLOOR_WITHOUT_OPTIMAL
    };

    raw.max(floor).round()
}

/// Map a model risk label, or derive one from the validated score.
pub fn normalize_risk(raw: Option<&str>, health_score: f64) -> RiskLevel {
    let label = raw.map(|r| r.trim().to_lowercase());
    match label.as_deref() {
        Some("low") | Some("minimal") => RiskLevel::Low,
        Some("moderate") | Some("medium") => RiskLevel::Moderate,
        Some("high") | Some("severe") | Some("critical") => RiskLevel::High,
        _ => risk_from_score(health_score),
    }
}

pub fn risk_from_score(health_score: f64) -> RiskLevel {
    if health_score >= 80.0 {
        RiskLevel::Low
    } else if health_score >= 60.0 {
        RiskLevel::Moderate
    } else {
        RiskLevel::High
    }
}
