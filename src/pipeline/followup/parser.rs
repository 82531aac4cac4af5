use serde_json::Value;

use crate::models::{FollowUpItem, FollowUpKind};
use crate::pipeline::extraction::strip_code_fences;
use crate::pipeline::PipelineError;

/// Upper bound on items kept from a single response.
pub const MAX_FOLLOWUP_ITEMS: usize = 8;

/// Object field carrying the item list for a kind.
pub fn collection_field(kind: FollowUpKind) -> &'static str {
    match kind {
        FollowUpKind::DoctorQuestions => "questions",
        FollowUpKind::ClinicalInsights => "insights",
    }
}

/// Parse follow-up items from a raw array or an object holding the kind's field.
///
/// Each item may be a bare string or an object with `text`, `question` or
/// `insight`, plus an optional `rationale`/`reason`.
pub fn parse_followup_response(
    kind: FollowUpKind,
    response: &str,
) -> Result<Vec<FollowUpItem>, PipelineError> {
    let value: Value = serde_json::from_str(strip_code_fences(response))
        .map_err(|e| PipelineError::Schema(format!("Follow-up response is not JSON: {e}")))?;

    let field = collection_field(kind);
    let list = match &value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get(field) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(PipelineError::Schema(format!(
                    "Follow-up response has no `{field}` array"
                )))
            }
        },
        _ => {
            return Err(PipelineError::Schema(
                "Follow-up response is neither array nor object".into(),
            ))
        }
    };

    let items: Vec<FollowUpItem> = list
        .iter()
        .filter_map(parse_item)
        .take(MAX_FOLLOWUP_ITEMS)
        .collect();
    if items.is_empty() {
        return Err(PipelineError::Schema("Follow-up response has no usable items".into()));
    }
    Ok(items)
}

fn parse_item(value: &Value) -> Option<FollowUpItem> {
    let (text, rationale) = match value {
        Value::String(s) => (s.as_str(), None),
        Value::Object(map) => {
            let text = ["text", "question", "insight"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))?;
            let rationale = ["rationale", "reason"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str));
            (text, rationale)
        }
        _ => return None,
    };

    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(FollowUpItem {
        text: text.to_string(),
        rationale: rationale
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q: FollowUpKind = FollowUpKind::DoctorQuestions;

    #[test]
    fn raw_string_array() {
        let items = parse_followup_response(Q, r#"["Is my LDL a concern?", "Should I retest?"]"#)
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], FollowUpItem::new("Is my LDL a concern?"));
    }

    #[test]
    fn object_with_field() {
        let json = r#"{"questions": [
            {"question": "Is my LDL a concern?", "rationale": "It is above range."},
            {"text": "Should I retest?", "reason": "  "}
        ]}"#;
        let items = parse_followup_response(Q, json).unwrap();
        assert_eq!(items[0].rationale.as_deref(), Some("It is above range."));
        assert_eq!(items[1].text, "Should I retest?");
        assert_eq!(items[1].rationale, None);
    }

    #[test]
    fn insights_use_their_own_field() {
        let json = r#"{"insights": [{"insight": "TSH relates to thyroid function."}]}"#;
        let items = parse_followup_response(FollowUpKind::ClinicalInsights, json).unwrap();
        assert_eq!(items.len(), 1);

        assert!(parse_followup_response(Q, json).is_err());
    }

    #[test]
    fn fenced_response() {
        let items = parse_followup_response(Q, "```json\n[\"Why?\"]\n```").unwrap();
        assert_eq!(items, vec![FollowUpItem::new("Why?")]);
    }

    #[test]
    fn junk_items_dropped() {
        let items = parse_followup_response(Q, r#"["", 42, {"rationale": "x"}, "Keep me"]"#).unwrap();
        assert_eq!(items, vec![FollowUpItem::new("Keep me")]);
    }

    #[test]
    fn failures_are_schema_errors() {
        for bad in ["not json", "[]", r#"{"questions": "none"}"#, "\"text\"", "[1, 2]"] {
            let err = parse_followup_response(Q, bad).unwrap_err();
            assert!(matches!(err, PipelineError::Schema(_)), "input: {bad}");
        }
    }

    #[test]
    fn list_is_capped() {
        let many: Vec<String> = (0..20).map(|i| format!("\"Q{i}\"")).collect();
        let items = parse_followup_response(Q, &format!("[{}]", many.join(","))).unwrap();
        assert_eq!(items.len(), MAX_FOLLOWUP_ITEMS);
    }
}
