use crate::models::Biomarker;

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"
You are a clinical laboratory data extraction assistant. You convert lab report
text into strict JSON. You never add markdown, prose, or code fences.

RULES:
1. Extract every biomarker explicitly present in the report.
2. Copy numeric values and units verbatim. Use null when a field is missing.
3. status MUST be one of: "optimal", "warning", "critical".
4. confidence is your certainty in the extracted line, between 0 and 1.
5. healthScore is an integer from 0 to 100 (100 = all biomarkers optimal).
6. riskLevel MUST be one of: "low", "moderate", "high".
"#;

/// Build the extraction prompt for one report.
///
/// `history` is the previous report's biomarker set, used only as context
/// for trends; values must still come from the current document.
pub fn build_extraction_prompt(raw_text: &str, symptoms: &str, history: &[Biomarker]) -> String {
    let symptoms = symptoms.trim();
    let symptoms_section = if symptoms.is_empty() {
        "The patient reported no symptoms.".to_string()
    } else {
        format!("<symptoms>\n{symptoms}\n</symptoms>")
    };

    let history_section = if history.is_empty() {
        String::new()
    } else {
        format!(
            "\nPrevious results for trend context (do NOT copy these values):\n<history>\n{}\n</history>\n",
            format_history(history)
        )
    };

    format!(
        r#"<document>
{raw_text}
</document>

{symptoms_section}
{history_section}
Return ONLY this JSON object:
{{
  "biomarkers": [
    {{
      "name": "test name as printed",
      "value": 0.0,
      "unit": "unit or null",
      "referenceMin": 0.0,
      "referenceMax": 0.0,
      "status": "optimal | warning | critical",
      "category": "e.g. lipids, metabolic, hematology, hormones, vitamins",
      "confidence": 0.0,
      "interpretation": "one sentence in plain language"
    }}
  ],
  "healthScore": 0,
  "riskLevel": "low | moderate | high",
  "summary": "two or three sentences relating results to the reported symptoms"
}}
"#
    )
}

/// One line per prior biomarker: `name value unit (status)`.
pub fn format_history(history: &[Biomarker]) -> String {
    history
        .iter()
        .map(|b| {
            let value = b.value.map(|v| v.to_string()).unwrap_or_else(|| "?".into());
            let unit = b.unit.as_deref().unwrap_or("");
            format!("{} {} {} ({})", b.name, value, unit, b.status)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
