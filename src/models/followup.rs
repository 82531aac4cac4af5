use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::FollowUpKind;

/// A single generated question or insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpItem {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl FollowUpItem {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            rationale: None,
        }
    }
}

/// Where a follow-up payload was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpSource {
    /// No flagged biomarkers: fixed payload, no cache or LLM involved.
    AllClear,
    LocalCache,
    GlobalCache,
    Generated,
    /// LLM output could not be parsed; static item served, nothing cached.
    Fallback,
}

/// Follow-up content returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpContent {
    pub kind: FollowUpKind,
    pub items: Vec<FollowUpItem>,
    pub source: FollowUpSource,
}

/// Row of the global (cross-user) follow-up cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub payload: Vec<FollowUpItem>,
    pub usage_count: i64,
    pub updated_at: NaiveDateTime,
}
