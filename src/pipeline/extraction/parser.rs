use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::models::Biomarker;
use crate::pipeline::scoring::normalize_status;
use crate::pipeline::PipelineError;

/// Upper bound on biomarkers kept from a single response.
pub const MAX_BIOMARKERS: usize = 60;

const DEFAULT_CONFIDENCE: f32 = 0.5;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*\n?(.*?)```").unwrap());

/// Model output after schema validation, before scoring.
#[derive(Debug, Clone)]
pub struct ParsedExtraction {
    pub biomarkers: Vec<Biomarker>,
    pub model_score: Option<f64>,
    pub risk_label: Option<String>,
    pub summary: String,
    /// Items dropped because they lacked a name or status.
    pub skipped: usize,
}

#[derive(Deserialize)]
struct RawExtraction {
    biomarkers: Option<Vec<Value>>,
    #[serde(alias = "health_score")]
    #[serde(rename = "healthScore")]
    health_score: Option<Value>,
    #[serde(alias = "risk_level")]
    #[serde(rename = "riskLevel")]
    risk_level: Option<Value>,
    summary: Option<Value>,
}

#[derive(Deserialize)]
struct RawBiomarker {
    name: Option<String>,
    value: Option<Value>,
    unit: Option<String>,
    #[serde(rename = "referenceMin", alias = "reference_min")]
    reference_min: Option<Value>,
    #[serde(rename = "referenceMax", alias = "reference_max")]
    reference_max: Option<Value>,
    status: Option<String>,
    category: Option<String>,
    confidence: Option<Value>,
    interpretation: Option<String>,
}

/// Remove a markdown code fence around the payload, if there is one.
pub fn strip_code_fences(response: &str) -> &str {
    match CODE_FENCE.captures(response).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => response.trim(),
    }
}

/// Parse the extraction response into validated biomarkers.
///
/// Fails with `Schema` when the payload is not a JSON object carrying a
/// `biomarkers` array, or when a non-empty array holds no usable item.
pub fn parse_extraction_response(response: &str) -> Result<ParsedExtraction, PipelineError> {
    let json_str = strip_code_fences(response);
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| PipelineError::Schema(format!("Extraction response is not JSON: {e}")))?;
    if !value.is_object() {
        return Err(PipelineError::Schema(
            "Extraction response is not a JSON object".into(),
        ));
    }

    let raw: RawExtraction = serde_json::from_value(value)
        .map_err(|e| PipelineError::Schema(format!("Unexpected extraction shape: {e}")))?;
    let items = raw
        .biomarkers
        .ok_or_else(|| PipelineError::Schema("Missing biomarkers array".into()))?;

    let total = items.len();
    let mut biomarkers: Vec<Biomarker> = items.iter().filter_map(parse_biomarker).collect();
    let skipped = total - biomarkers.len();

    if total > 0 && biomarkers.is_empty() {
        return Err(PipelineError::Schema(format!(
            "None of the {total} extracted biomarkers were usable"
        )));
    }
    if skipped > 0 {
        tracing::warn!(skipped, total, "Dropped malformed biomarker entries");
    }
    if biomarkers.len() > MAX_BIOMARKERS {
        tracing::warn!(
            count = biomarkers.len(),
            max = MAX_BIOMARKERS,
            "Biomarker list truncated"
        );
        biomarkers.truncate(MAX_BIOMARKERS);
    }

    Ok(ParsedExtraction {
        biomarkers,
        model_score: raw.health_score.as_ref().and_then(lenient_number),
        risk_label: raw.risk_level.as_ref().and_then(|v| v.as_str().map(String::from)),
        summary: raw
            .summary
            .as_ref()
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        skipped,
    })
}

fn parse_biomarker(item: &Value) -> Option<Biomarker> {
    let raw: RawBiomarker = serde_json::from_value(item.clone()).ok()?;
    let name = raw.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())?;
    let status = raw.status.filter(|s| !s.trim().is_empty())?;

    Some(Biomarker {
        name,
        value: raw.value.as_ref().and_then(lenient_number),
        unit: non_empty(raw.unit),
        reference_min: raw.reference_min.as_ref().and_then(lenient_number),
        reference_max: raw.reference_max.as_ref().and_then(lenient_number),
        status: normalize_status(&status),
        category: non_empty(raw.category),
        confidence: raw
            .confidence
            .as_ref()
            .and_then(lenient_number)
            .map(|c| (c as f32).clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_CONFIDENCE),
        interpretation: raw.interpretation.unwrap_or_default().trim().to_string(),
    })
}

/// A JSON number, or a string that parses as one.
fn lenient_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
