//! AI Extractor — delegates field extraction to the LLM provider and parses
//! the constrained JSON response into candidate values.
//!
//! The trait seam lets the policy engine run against any backend; tests use
//! a mock. Failure semantics matter here: a malformed model response is
//! "zero extractions" (logged, not an error), while a transport/provider
//! failure surfaces as an error because it means AI extraction is unusable
//! for the whole batch.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::catalog::normalizer::FieldDescriptor;
use crate::errors::AppError;
use crate::extraction::prompts::{EXTRACTION_PROMPT_TEMPLATE, EXTRACTION_SYSTEM};
use crate::extraction::{CandidateValue, ExtractedFieldValue, ExtractionMethod};
use crate::llm_client::prompts::FIDELITY_INSTRUCTION;
use crate::llm_client::{LlmClient, LlmError};

/// Sample allowed values included per field in the prompt.
const MAX_SAMPLE_VALUES: usize = 10;

/// Minimum model-reported confidence for an extraction to be accepted.
const MIN_AI_CONFIDENCE: f64 = 0.5;

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// The AI extraction backend. Implement this to swap providers (or mock the
/// model in tests) without touching the policy engine.
///
/// Carried in `AppState` as `Arc<dyn AiExtractor>`.
#[async_trait]
pub trait AiExtractor: Send + Sync {
    async fn extract(
        &self,
        text: &str,
        fields: &[FieldDescriptor],
    ) -> Result<Vec<ExtractedFieldValue>, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LLM-backed implementation
// ────────────────────────────────────────────────────────────────────────────

/// Production backend: one structured prompt per call through `LlmClient`.
pub struct LlmAiExtractor {
    llm: LlmClient,
}

impl LlmAiExtractor {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AiExtractor for LlmAiExtractor {
    async fn extract(
        &self,
        text: &str,
        fields: &[FieldDescriptor],
    ) -> Result<Vec<ExtractedFieldValue>, AppError> {
        let prompt = build_extraction_prompt(text, fields);

        let response: AiExtractionResponse = match self.llm.call_json(&prompt, EXTRACTION_SYSTEM).await
        {
            Ok(response) => response,
            // A response we couldn't interpret is "zero extractions" — the
            // caller falls back to pattern extraction
            Err(LlmError::Parse(e)) => {
                warn!("AI extraction response was not valid JSON: {e}");
                return Ok(Vec::new());
            }
            Err(LlmError::EmptyContent) => {
                warn!("AI extraction returned empty content");
                return Ok(Vec::new());
            }
            // Transport/provider failure: AI is unusable for this batch
            Err(e) => return Err(AppError::Llm(format!("AI extraction call failed: {e}"))),
        };

        Ok(accept_extractions(response, fields))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Prompt construction
// ────────────────────────────────────────────────────────────────────────────

/// Builds the single structured prompt describing every field and the text.
pub fn build_extraction_prompt(text: &str, fields: &[FieldDescriptor]) -> String {
    let field_specs: Vec<Value> = fields
        .iter()
        .map(|field| {
            let mut spec = serde_json::json!({
                "id": field.id,
                "name": field.name,
                "type": field.field_type,
                "required": field.required,
            });
            let labels = field.allowed_labels();
            if !labels.is_empty() {
                spec["allowedValues"] = serde_json::json!(
                    labels.iter().take(MAX_SAMPLE_VALUES).collect::<Vec<_>>()
                );
            }
            if let Some(description) = &field.description {
                spec["description"] = serde_json::json!(description);
            }
            spec
        })
        .collect();

    let fields_json =
        serde_json::to_string_pretty(&field_specs).unwrap_or_else(|_| "[]".to_string());

    EXTRACTION_PROMPT_TEMPLATE
        .replace("{fidelity_instruction}", FIDELITY_INSTRUCTION)
        .replace("{fields_json}", &fields_json)
        .replace("{description}", text)
}

// ────────────────────────────────────────────────────────────────────────────
// Response handling
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AiExtractionResponse {
    #[serde(default)]
    extractions: Vec<AiExtraction>,
}

#[derive(Debug, Deserialize)]
struct AiExtraction {
    #[serde(rename = "fieldId")]
    field_id: String,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    confidence: f64,
}

/// Filters model output down to usable candidates: the fieldId must be one
/// we asked about, the value non-null, and the confidence above the floor.
fn accept_extractions(
    response: AiExtractionResponse,
    fields: &[FieldDescriptor],
) -> Vec<ExtractedFieldValue> {
    let known_ids: HashSet<&str> = fields.iter().map(|f| f.id.as_str()).collect();

    response
        .extractions
        .into_iter()
        .filter_map(|extraction| {
            if !known_ids.contains(extraction.field_id.as_str()) {
                warn!("AI returned unknown fieldId '{}'", extraction.field_id);
                return None;
            }
            if extraction.confidence <= MIN_AI_CONFIDENCE {
                return None;
            }
            let value = candidate_value_from_json(&extraction.value)?;
            Some(ExtractedFieldValue {
                field_id: extraction.field_id,
                value,
                confidence: extraction.confidence.clamp(0.0, 1.0),
                method: ExtractionMethod::Ai,
                suggestion: None,
            })
        })
        .collect()
}

/// Converts a raw JSON value into a candidate value. Null and unsupported
/// shapes yield None.
fn candidate_value_from_json(value: &Value) -> Option<CandidateValue> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(CandidateValue::Text(s.clone())),
        Value::Number(n) => n.as_f64().map(CandidateValue::Number),
        Value::Bool(b) => Some(CandidateValue::text(if *b { "Yes" } else { "No" })),
        Value::Array(items) => {
            let strings: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect();
            if strings.is_empty() {
                None
            } else {
                Some(CandidateValue::List(strings))
            }
        }
        _ => None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::normalizer::{AllowedValue, FieldType};

    fn field(id: &str, name: &str, allowed: &[&str]) -> FieldDescriptor {
        FieldDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            field_type: FieldType::Select,
            required: false,
            allowed_values: if allowed.is_empty() {
                None
            } else {
                Some(allowed.iter().map(|v| AllowedValue::plain(v)).collect())
            },
            description: None,
        }
    }

    fn response(json: serde_json::Value) -> AiExtractionResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_prompt_lists_every_field_id() {
        let fields = vec![field("priority", "Priority", &[]), field("labels", "Labels", &[])];
        let prompt = build_extraction_prompt("add dark mode", &fields);
        assert!(prompt.contains("\"priority\""));
        assert!(prompt.contains("\"labels\""));
        assert!(prompt.contains("add dark mode"));
    }

    #[test]
    fn test_prompt_caps_sample_values_at_ten() {
        let many: Vec<String> = (0..25).map(|i| format!("Value {i}")).collect();
        let many_refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let fields = vec![field("sprint", "Sprint", &many_refs)];
        let prompt = build_extraction_prompt("text", &fields);
        assert!(prompt.contains("Value 9"));
        assert!(!prompt.contains("Value 10"));
    }

    #[test]
    fn test_accept_filters_unknown_field_ids() {
        let fields = vec![field("priority", "Priority", &[])];
        let accepted = accept_extractions(
            response(serde_json::json!({
                "extractions": [
                    {"fieldId": "priority", "value": "High", "confidence": 0.9},
                    {"fieldId": "made_up", "value": "x", "confidence": 0.9}
                ]
            })),
            &fields,
        );
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].field_id, "priority");
        assert_eq!(accepted[0].method, ExtractionMethod::Ai);
    }

    #[test]
    fn test_accept_filters_low_confidence_and_null_values() {
        let fields = vec![field("priority", "Priority", &[]), field("labels", "Labels", &[])];
        let accepted = accept_extractions(
            response(serde_json::json!({
                "extractions": [
                    {"fieldId": "priority", "value": "High", "confidence": 0.5},
                    {"fieldId": "labels", "value": null, "confidence": 0.9}
                ]
            })),
            &fields,
        );
        assert!(accepted.is_empty(), "0.5 confidence and null value must both be rejected");
    }

    #[test]
    fn test_accept_missing_extractions_key_is_empty() {
        let accepted = accept_extractions(response(serde_json::json!({})), &[]);
        assert!(accepted.is_empty());
    }

    #[test]
    fn test_candidate_value_shapes() {
        assert_eq!(
            candidate_value_from_json(&serde_json::json!("High")),
            Some(CandidateValue::text("High"))
        );
        assert_eq!(
            candidate_value_from_json(&serde_json::json!(8)),
            Some(CandidateValue::Number(8.0))
        );
        assert_eq!(
            candidate_value_from_json(&serde_json::json!(["a", "b"])),
            Some(CandidateValue::List(vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(
            candidate_value_from_json(&serde_json::json!(true)),
            Some(CandidateValue::text("Yes"))
        );
        assert_eq!(candidate_value_from_json(&serde_json::json!(null)), None);
        assert_eq!(candidate_value_from_json(&serde_json::json!("  ")), None);
    }

    #[test]
    fn test_confidence_clamped_to_unit_interval() {
        let fields = vec![field("priority", "Priority", &[])];
        let accepted = accept_extractions(
            response(serde_json::json!({
                "extractions": [{"fieldId": "priority", "value": "High", "confidence": 1.7}]
            })),
            &fields,
        );
        assert_eq!(accepted[0].confidence, 1.0);
    }
}
