use crate::models::{Biomarker, FollowUpKind};

/// Namespace tag prefixed to every signature of a kind.
pub fn namespace_tag(kind: FollowUpKind) -> &'static str {
    match kind {
        FollowUpKind::DoctorQuestions => "questions_",
        FollowUpKind::ClinicalInsights => "insights_",
    }
}

/// Cache key for the global tier.
///
/// Only flagged biomarkers contribute, sorted by name (case-sensitive) and
/// rendered as `lowercase-name:status`, so the key does not depend on input
/// order or on which user produced the report.
pub fn compute_signature(kind: FollowUpKind, biomarkers: &[Biomarker]) -> String {
    let mut flagged: Vec<&Biomarker> = biomarkers.iter().filter(|b| b.status.is_flagged()).collect();
    flagged.sort_by(|a, b| a.name.cmp(&b.name));

    let body = flagged
        .iter()
        .map(|b| format!("{}:{}", b.name.to_lowercase(), b.status))
        .collect::<Vec<_>>()
        .join("|");
    format!("{}{}", namespace_tag(kind), body)
}
