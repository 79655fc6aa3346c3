// Field extraction engine
// Implements: deterministic pattern heuristics, AI extraction, policy
// orchestration, and suggestion ranking.
// All LLM calls go through llm_client — no direct Anthropic SDK calls here.

pub mod ai;
pub mod handlers;
pub mod patterns;
pub mod policy;
pub mod prompts;
pub mod suggest;

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Shared data models (used by both extractor backends and the policy engine)
// ────────────────────────────────────────────────────────────────────────────

/// An extracted scalar or array value.
///
/// Arrays are used for multiselect fields. Serialized untagged so results
/// read as plain JSON values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidateValue {
    Number(f64),
    List(Vec<String>),
    Text(String),
}

impl CandidateValue {
    pub fn text(value: &str) -> Self {
        CandidateValue::Text(value.to_string())
    }
}

/// How a candidate value was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Ai,
    Pattern,
    Default,
}

/// One proposed value for one field.
///
/// Confidence is always in (0, 1] — extractors return no entry at all rather
/// than a zero-confidence one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFieldValue {
    pub field_id: String,
    pub value: CandidateValue,
    pub confidence: f64,
    pub method: ExtractionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}
