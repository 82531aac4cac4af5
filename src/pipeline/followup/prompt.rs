use crate::models::{FollowUpKind, LabReport};

pub const QUESTIONS_SYSTEM_PROMPT: &str = "You help patients prepare for a doctor's \
appointment. You write short, specific questions a patient can ask about their own lab \
results. You never diagnose and never recommend medication. Output JSON only.";

pub const INSIGHTS_SYSTEM_PROMPT: &str = "You explain lab results to patients in plain \
language. You describe what out-of-range biomarkers commonly relate to and which lifestyle \
factors are worth discussing with a clinician. You never diagnose. Output JSON only.";

pub fn system_prompt(kind: FollowUpKind) -> &'static str {
    match kind {
        FollowUpKind::DoctorQuestions => QUESTIONS_SYSTEM_PROMPT,
        FollowUpKind::ClinicalInsights => INSIGHTS_SYSTEM_PROMPT,
    }
}

/// Build the generation prompt from the report's flagged biomarkers.
///
/// Values and symptoms are left out on purpose: the response is shared
/// with every user whose flagged set has the same signature.
pub fn build_followup_prompt(kind: FollowUpKind, report: &LabReport) -> String {
    let flagged = report
        .biomarkers
        .iter()
        .filter(|b| b.status.is_flagged())
        .map(|b| format!("- {} ({})", b.name, b.status))
        .collect::<Vec<_>>()
        .join("\n");

    let (task, field, item_key) = match kind {
        FollowUpKind::DoctorQuestions => (
            "Write 3 to 6 questions the patient should ask their doctor about these results.",
            "questions",
            "question",
        ),
        FollowUpKind::ClinicalInsights => (
            "Write 3 to 6 short insights explaining what these results may relate to.",
            "insights",
            "insight",
        ),
    };

    format!(
        r#"Flagged biomarkers:
{flagged}

{task}

Return ONLY this JSON:
{{"{field}": [{{"{item_key}": "...", "rationale": "one short sentence"}}]}}
"#
    )
}
