//! Extraction Policy Engine — orchestrates the full extraction run.
//!
//! Flow per field: eligibility → skip/manual short-circuits → extraction
//! (AI with pattern fallback, both under the field's threshold gate) →
//! bucket classification by extraction mode.
//!
//! Fields are processed strictly in the order supplied, and a failure while
//! extracting one field's value is downgraded locally — it never aborts the
//! batch. The worst outcome for any field is the manual bucket.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::issue_types::WorkItemType;
use crate::catalog::normalizer::FieldDescriptor;
use crate::errors::AppError;
use crate::extraction::ai::AiExtractor;
use crate::extraction::patterns::PatternExtractor;
use crate::extraction::suggest::suggest;
use crate::extraction::{CandidateValue, ExtractedFieldValue};

/// Confidence floor for auto-applying a field that has no explicit per-field
/// config. Deliberately stricter than configured fields: without a user
/// decision on record, only high-certainty candidates skip confirmation.
const UNCONFIGURED_AUTO_APPLY_FLOOR: f64 = 0.8;

/// Hint suggestions attached to confirmation-bucket candidates.
const HINT_SUGGESTIONS: usize = 3;

// ────────────────────────────────────────────────────────────────────────────
// Configuration models
// ────────────────────────────────────────────────────────────────────────────

/// Extraction backend selection, per field or as the global default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfiguredMethod {
    Ai,
    #[default]
    Pattern,
    Manual,
}

/// How confidence translates into bucket assignment for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMode {
    #[default]
    AutoApply,
    AlwaysConfirm,
    ManualOnly,
}

/// User-defined per-field extraction policy.
/// Loaded once per run and never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldExtractionConfig {
    pub jira_field_id: String,
    #[serde(default = "default_enabled")]
    pub extraction_enabled: bool,
    #[serde(default)]
    pub extraction_method: ConfiguredMethod,
    #[serde(default)]
    pub extraction_mode: ExtractionMode,
    #[serde(default = "default_threshold")]
    pub confidence_threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// User-added requirement, stronger than the tracker's own flag.
    #[serde(default)]
    pub required_for_submission: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_threshold() -> f64 {
    0.7
}

/// Global fallback policy used when no per-field config exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionPreferences {
    #[serde(default)]
    pub default_method: ConfiguredMethod,
    #[serde(default = "default_threshold")]
    pub global_confidence_threshold: f64,
    /// Forces every field into the confirmation bucket regardless of
    /// confidence or per-field mode.
    #[serde(default)]
    pub require_confirmation_for_all: bool,
    /// Advisory; influences default method selection only.
    #[serde(default = "default_enabled")]
    pub enable_smart_defaults: bool,
}

impl Default for ExtractionPreferences {
    fn default() -> Self {
        Self {
            default_method: ConfiguredMethod::Pattern,
            global_confidence_threshold: 0.7,
            require_confirmation_for_all: false,
            enable_smart_defaults: true,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Result models
// ────────────────────────────────────────────────────────────────────────────

/// Running counts, accumulated as fields are classified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub total_fields: usize,
    pub auto_applied_count: usize,
    pub confirmation_count: usize,
    pub manual_count: usize,
    pub skipped_count: usize,
}

/// The engine's output. A field id appears in at most one bucket, and the
/// four counts always sum to `total_fields`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnhancedExtractionResult {
    pub auto_applied: HashMap<String, CandidateValue>,
    pub requires_confirmation: HashMap<String, ExtractedFieldValue>,
    /// Insertion order = processing order; callers rely on it.
    pub manual_fields: Vec<String>,
    pub skipped_fields: Vec<String>,
    pub extraction_summary: ExtractionSummary,
}

impl EnhancedExtractionResult {
    fn push_auto(&mut self, field_id: &str, value: CandidateValue) {
        self.auto_applied.insert(field_id.to_string(), value);
        self.extraction_summary.auto_applied_count += 1;
    }

    fn push_confirmation(&mut self, field_id: &str, candidate: ExtractedFieldValue) {
        self.requires_confirmation
            .insert(field_id.to_string(), candidate);
        self.extraction_summary.confirmation_count += 1;
    }

    fn push_manual(&mut self, field_id: &str) {
        self.manual_fields.push(field_id.to_string());
        self.extraction_summary.manual_count += 1;
    }

    fn push_skipped(&mut self, field_id: &str) {
        self.skipped_fields.push(field_id.to_string());
        self.extraction_summary.skipped_count += 1;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

/// Stateless orchestrator. Holds only the compiled pattern rules; every run
/// is a pure function over its inputs plus at most one AI call per field.
pub struct ExtractionPolicyEngine {
    patterns: PatternExtractor,
}

impl Default for ExtractionPolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionPolicyEngine {
    pub fn new() -> Self {
        Self {
            patterns: PatternExtractor::new(),
        }
    }

    /// Runs the config-driven extraction pipeline — the canonical entry point.
    ///
    /// A field is eligible when it is explicitly configured or required by
    /// the tracker; everything else is left untouched (absent from every
    /// bucket and from the counts).
    #[allow(clippy::too_many_arguments)]
    pub async fn run_extraction(
        &self,
        text: &str,
        fields: &[FieldDescriptor],
        work_item_type: WorkItemType,
        configs: &HashMap<String, FieldExtractionConfig>,
        preferences: &ExtractionPreferences,
        ai: Option<&dyn AiExtractor>,
        today: NaiveDate,
    ) -> EnhancedExtractionResult {
        info!(
            "Extraction run: {} fields, {} configs, work item {:?}",
            fields.len(),
            configs.len(),
            work_item_type
        );

        let mut result = EnhancedExtractionResult::default();

        for field in fields {
            let config = configs.get(&field.id);
            if config.is_none() && !field.required {
                debug!("field '{}' unconfigured and optional — not processed", field.id);
                continue;
            }
            result.extraction_summary.total_fields += 1;

            match config {
                Some(config) => {
                    self.process_configured(text, field, config, preferences, ai, today, &mut result)
                        .await
                }
                None => {
                    self.process_with_defaults(text, field, preferences, ai, today, &mut result)
                        .await
                }
            }
        }

        info!(
            "Extraction run complete: {} auto, {} confirm, {} manual, {} skipped",
            result.extraction_summary.auto_applied_count,
            result.extraction_summary.confirmation_count,
            result.extraction_summary.manual_count,
            result.extraction_summary.skipped_count,
        );

        result
    }

    /// Classifies one explicitly configured field.
    async fn process_configured(
        &self,
        text: &str,
        field: &FieldDescriptor,
        config: &FieldExtractionConfig,
        preferences: &ExtractionPreferences,
        ai: Option<&dyn AiExtractor>,
        today: NaiveDate,
        result: &mut EnhancedExtractionResult,
    ) {
        // Step 1: disabled fields are skipped regardless of anything else
        if !config.extraction_enabled {
            result.push_skipped(&field.id);
            return;
        }

        // Step 2: manual routing short-circuits extraction entirely
        if config.extraction_method == ConfiguredMethod::Manual
            || config.extraction_mode == ExtractionMode::ManualOnly
        {
            result.push_manual(&field.id);
            return;
        }

        // Step 3: extraction under the field's threshold gate
        let candidate = self.obtain_candidate(text, field, config, ai, today).await;

        // Step 4/5: classify, or fall through to manual
        match candidate {
            Some(candidate) => match config.extraction_mode {
                ExtractionMode::AutoApply => {
                    if candidate.confidence >= config.confidence_threshold
                        && !preferences.require_confirmation_for_all
                    {
                        result.push_auto(&field.id, candidate.value);
                    } else {
                        self.push_confirmation_with_hint(field, text, candidate, result);
                    }
                }
                ExtractionMode::AlwaysConfirm => {
                    self.push_confirmation_with_hint(field, text, candidate, result);
                }
                // Intercepted in step 2 — confirm defensively if ever reached
                ExtractionMode::ManualOnly => {
                    self.push_confirmation_with_hint(field, text, candidate, result);
                }
            },
            None => result.push_manual(&field.id),
        }
    }

    /// Obtains a candidate for a configured field: AI first when configured
    /// and available, then the pattern extractor, both gated by the field's
    /// confidence threshold. AI failure downgrades to patterns for this
    /// field only.
    async fn obtain_candidate(
        &self,
        text: &str,
        field: &FieldDescriptor,
        config: &FieldExtractionConfig,
        ai: Option<&dyn AiExtractor>,
        today: NaiveDate,
    ) -> Option<ExtractedFieldValue> {
        if config.extraction_method == ConfiguredMethod::Ai {
            if let Some(ai) = ai {
                match ai.extract(text, std::slice::from_ref(field)).await {
                    Ok(values) => {
                        if let Some(first) =
                            values.into_iter().find(|v| v.field_id == field.id)
                        {
                            if first.confidence >= config.confidence_threshold {
                                return Some(first);
                            }
                            debug!(
                                "AI candidate for '{}' below threshold ({} < {}) — trying patterns",
                                field.id, first.confidence, config.confidence_threshold
                            );
                        }
                    }
                    Err(e) => {
                        warn!(
                            "AI extraction failed for field '{}': {e} — falling back to patterns",
                            field.id
                        );
                    }
                }
            }
        }

        self.patterns
            .extract_field(text, field, today)
            .filter(|candidate| candidate.confidence >= config.confidence_threshold)
    }

    /// Classifies one field that is required by the tracker but has no
    /// per-field config, using global preferences. Auto-apply additionally
    /// requires the 0.8 floor — stricter than configured fields.
    async fn process_with_defaults(
        &self,
        text: &str,
        field: &FieldDescriptor,
        preferences: &ExtractionPreferences,
        ai: Option<&dyn AiExtractor>,
        today: NaiveDate,
        result: &mut EnhancedExtractionResult,
    ) {
        if preferences.default_method == ConfiguredMethod::Manual {
            result.push_manual(&field.id);
            return;
        }

        let mut candidate = None;
        if preferences.default_method == ConfiguredMethod::Ai {
            if let Some(ai) = ai {
                match ai.extract(text, std::slice::from_ref(field)).await {
                    Ok(values) => {
                        candidate = values.into_iter().find(|v| v.field_id == field.id)
                    }
                    Err(e) => warn!(
                        "AI extraction failed for required field '{}': {e} — falling back to patterns",
                        field.id
                    ),
                }
            }
        }
        if candidate.is_none() {
            candidate = self.patterns.extract_field(text, field, today);
        }

        match candidate {
            Some(candidate) => {
                let threshold = preferences.global_confidence_threshold;
                if candidate.confidence >= threshold
                    && candidate.confidence >= UNCONFIGURED_AUTO_APPLY_FLOOR
                    && !preferences.require_confirmation_for_all
                {
                    result.push_auto(&field.id, candidate.value);
                } else if candidate.confidence >= threshold {
                    self.push_confirmation_with_hint(field, text, candidate, result);
                } else {
                    result.push_manual(&field.id);
                }
            }
            None => result.push_manual(&field.id),
        }
    }

    /// Places a candidate into the confirmation bucket with the advisory
    /// "Consider: …" hint built from the top-ranked alternative values.
    fn push_confirmation_with_hint(
        &self,
        field: &FieldDescriptor,
        text: &str,
        mut candidate: ExtractedFieldValue,
        result: &mut EnhancedExtractionResult,
    ) {
        let ranked = suggest(field, text);
        if !ranked.is_empty() {
            let hint = ranked
                .into_iter()
                .take(HINT_SUGGESTIONS)
                .collect::<Vec<_>>()
                .join(", ");
            candidate.suggestion = Some(format!("Consider: {hint}"));
        }
        result.push_confirmation(&field.id, candidate);
    }

    // ────────────────────────────────────────────────────────────────────────
    // Legacy whole-batch path
    // ────────────────────────────────────────────────────────────────────────

    /// Deprecated: the whole-batch extraction path, preserved for backward
    /// compatibility with looser guarantees than `run_extraction`.
    ///
    /// Tries AI for all fields at once — a provider failure here is
    /// re-thrown, and the caller is expected to fall back to full pattern
    /// extraction — then fills in pattern candidates for fields the AI
    /// missed. No per-field threshold gating.
    pub async fn extract_field_values(
        &self,
        text: &str,
        fields: &[FieldDescriptor],
        ai: Option<&dyn AiExtractor>,
        today: NaiveDate,
    ) -> Result<Vec<ExtractedFieldValue>, AppError> {
        let mut values = match ai {
            Some(ai) => ai.extract(text, fields).await?,
            None => Vec::new(),
        };

        for field in fields {
            if values.iter().any(|v| v.field_id == field.id) {
                continue;
            }
            if let Some(candidate) = self.patterns.extract_field(text, field, today) {
                values.push(candidate);
            }
        }

        Ok(values)
    }

    /// Full pattern-only extraction, the documented fallback when the legacy
    /// AI batch path fails outright.
    pub fn extract_with_patterns(
        &self,
        text: &str,
        fields: &[FieldDescriptor],
        today: NaiveDate,
    ) -> Vec<ExtractedFieldValue> {
        self.patterns.extract(text, fields, today)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::normalizer::{AllowedValue, FieldType};
    use crate::extraction::ExtractionMethod;
    use async_trait::async_trait;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn field(id: &str, name: &str, field_type: FieldType, allowed: &[&str], required: bool) -> FieldDescriptor {
        FieldDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            field_type,
            required,
            allowed_values: if allowed.is_empty() {
                None
            } else {
                Some(allowed.iter().map(|v| AllowedValue::plain(v)).collect())
            },
            description: None,
        }
    }

    fn priority_field(required: bool) -> FieldDescriptor {
        field(
            "priority",
            "Priority",
            FieldType::Select,
            &["Highest", "High", "Medium", "Low", "Lowest"],
            required,
        )
    }

    fn config(field_id: &str) -> FieldExtractionConfig {
        FieldExtractionConfig {
            jira_field_id: field_id.to_string(),
            extraction_enabled: true,
            extraction_method: ConfiguredMethod::Pattern,
            extraction_mode: ExtractionMode::AutoApply,
            confidence_threshold: 0.7,
            display_name: None,
            required_for_submission: false,
        }
    }

    fn configs(list: Vec<FieldExtractionConfig>) -> HashMap<String, FieldExtractionConfig> {
        list.into_iter()
            .map(|c| (c.jira_field_id.clone(), c))
            .collect()
    }

    fn ai_value(field_id: &str, value: &str, confidence: f64) -> ExtractedFieldValue {
        ExtractedFieldValue {
            field_id: field_id.to_string(),
            value: CandidateValue::text(value),
            confidence,
            method: ExtractionMethod::Ai,
            suggestion: None,
        }
    }

    /// Mock AI backend: canned values, or a transport failure.
    struct MockAi {
        values: Vec<ExtractedFieldValue>,
        fail: bool,
    }

    impl MockAi {
        fn with(values: Vec<ExtractedFieldValue>) -> Self {
            Self { values, fail: false }
        }

        fn failing() -> Self {
            Self { values: vec![], fail: true }
        }
    }

    #[async_trait]
    impl AiExtractor for MockAi {
        async fn extract(
            &self,
            _text: &str,
            fields: &[FieldDescriptor],
        ) -> Result<Vec<ExtractedFieldValue>, AppError> {
            if self.fail {
                return Err(AppError::Llm("mock provider unreachable".to_string()));
            }
            Ok(self
                .values
                .iter()
                .filter(|v| fields.iter().any(|f| f.id == v.field_id))
                .cloned()
                .collect())
        }
    }

    fn assert_partition_invariant(result: &EnhancedExtractionResult) {
        let summary = &result.extraction_summary;
        assert_eq!(
            summary.total_fields,
            summary.auto_applied_count
                + summary.confirmation_count
                + summary.manual_count
                + summary.skipped_count,
            "bucket counts must sum to total_fields"
        );

        let mut all_ids: Vec<&String> = result
            .auto_applied
            .keys()
            .chain(result.requires_confirmation.keys())
            .chain(result.manual_fields.iter())
            .chain(result.skipped_fields.iter())
            .collect();
        let before = all_ids.len();
        all_ids.sort();
        all_ids.dedup();
        assert_eq!(before, all_ids.len(), "buckets must be pairwise disjoint");
    }

    #[tokio::test]
    async fn test_disabled_config_skips_field() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![priority_field(true)];
        let mut cfg = config("priority");
        cfg.extraction_enabled = false;

        let result = engine
            .run_extraction(
                "critical bug",
                &fields,
                WorkItemType::Bug,
                &configs(vec![cfg]),
                &ExtractionPreferences::default(),
                None,
                today(),
            )
            .await;

        assert_eq!(result.skipped_fields, vec!["priority"]);
        assert!(result.auto_applied.is_empty());
        assert_partition_invariant(&result);
    }

    #[tokio::test]
    async fn test_manual_method_routes_to_manual() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![priority_field(false)];
        let mut cfg = config("priority");
        cfg.extraction_method = ConfiguredMethod::Manual;

        let result = engine
            .run_extraction(
                "critical bug",
                &fields,
                WorkItemType::Bug,
                &configs(vec![cfg]),
                &ExtractionPreferences::default(),
                None,
                today(),
            )
            .await;

        assert_eq!(result.manual_fields, vec!["priority"]);
        assert_partition_invariant(&result);
    }

    #[tokio::test]
    async fn test_auto_apply_above_threshold() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![priority_field(false)];

        let result = engine
            .run_extraction(
                "this is critical",
                &fields,
                WorkItemType::Bug,
                &configs(vec![config("priority")]),
                &ExtractionPreferences::default(),
                None,
                today(),
            )
            .await;

        assert_eq!(
            result.auto_applied.get("priority"),
            Some(&CandidateValue::text("Highest"))
        );
        assert_partition_invariant(&result);
    }

    #[tokio::test]
    async fn test_raising_threshold_moves_field_out_of_auto() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![priority_field(false)];
        let mut cfg = config("priority");
        cfg.confidence_threshold = 0.9; // pattern priority confidence is 0.8

        let result = engine
            .run_extraction(
                "this is critical",
                &fields,
                WorkItemType::Bug,
                &configs(vec![cfg]),
                &ExtractionPreferences::default(),
                None,
                today(),
            )
            .await;

        // The 0.8 candidate no longer clears the gate — manual, not auto
        assert!(result.auto_applied.is_empty());
        assert_eq!(result.manual_fields, vec!["priority"]);
        assert_partition_invariant(&result);
    }

    #[tokio::test]
    async fn test_always_confirm_lands_in_confirmation_with_hint() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![priority_field(false)];
        let mut cfg = config("priority");
        cfg.extraction_mode = ExtractionMode::AlwaysConfirm;

        let result = engine
            .run_extraction(
                "this is critical and high risk",
                &fields,
                WorkItemType::Bug,
                &configs(vec![cfg]),
                &ExtractionPreferences::default(),
                None,
                today(),
            )
            .await;

        let candidate = result.requires_confirmation.get("priority").unwrap();
        assert_eq!(candidate.value, CandidateValue::text("Highest"));
        let hint = candidate.suggestion.as_deref().unwrap();
        assert!(hint.starts_with("Consider: "), "hint was {hint}");
        assert!(hint.contains("High"));
        assert_partition_invariant(&result);
    }

    #[tokio::test]
    async fn test_require_confirmation_for_all_empties_auto_bucket() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![
            priority_field(false),
            field("customfield_10016", "Story Points", FieldType::Number, &[], false),
        ];
        let preferences = ExtractionPreferences {
            require_confirmation_for_all: true,
            ..Default::default()
        };

        let result = engine
            .run_extraction(
                "critical work, 8 story points",
                &fields,
                WorkItemType::Story,
                &configs(vec![config("priority"), config("customfield_10016")]),
                &preferences,
                None,
                today(),
            )
            .await;

        assert!(result.auto_applied.is_empty());
        assert_eq!(result.extraction_summary.confirmation_count, 2);
        assert_partition_invariant(&result);
    }

    #[tokio::test]
    async fn test_ai_candidate_above_threshold_wins() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![priority_field(false)];
        let mut cfg = config("priority");
        cfg.extraction_method = ConfiguredMethod::Ai;
        let ai = MockAi::with(vec![ai_value("priority", "Medium", 0.95)]);

        let result = engine
            .run_extraction(
                "some vague text",
                &fields,
                WorkItemType::Task,
                &configs(vec![cfg]),
                &ExtractionPreferences::default(),
                Some(&ai),
                today(),
            )
            .await;

        assert_eq!(
            result.auto_applied.get("priority"),
            Some(&CandidateValue::text("Medium"))
        );
    }

    #[tokio::test]
    async fn test_ai_below_threshold_falls_back_to_patterns() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![priority_field(false)];
        let mut cfg = config("priority");
        cfg.extraction_method = ConfiguredMethod::Ai;
        let ai = MockAi::with(vec![ai_value("priority", "Medium", 0.55)]);

        let result = engine
            .run_extraction(
                "this is critical",
                &fields,
                WorkItemType::Task,
                &configs(vec![cfg]),
                &ExtractionPreferences::default(),
                Some(&ai),
                today(),
            )
            .await;

        // Pattern candidate (Highest @ 0.8) clears the gate instead
        assert_eq!(
            result.auto_applied.get("priority"),
            Some(&CandidateValue::text("Highest"))
        );
    }

    #[tokio::test]
    async fn test_ai_failure_downgrades_without_aborting_batch() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![
            priority_field(false),
            field("customfield_10016", "Story Points", FieldType::Number, &[], false),
        ];
        let mut priority_cfg = config("priority");
        priority_cfg.extraction_method = ConfiguredMethod::Ai;
        let ai = MockAi::failing();

        let result = engine
            .run_extraction(
                "critical fix, 5 points",
                &fields,
                WorkItemType::Bug,
                &configs(vec![priority_cfg, config("customfield_10016")]),
                &ExtractionPreferences::default(),
                Some(&ai),
                today(),
            )
            .await;

        // Priority degraded to patterns and still resolved; points unaffected
        assert_eq!(
            result.auto_applied.get("priority"),
            Some(&CandidateValue::text("Highest"))
        );
        assert_eq!(
            result.auto_applied.get("customfield_10016"),
            Some(&CandidateValue::Number(5.0))
        );
        assert_partition_invariant(&result);
    }

    #[tokio::test]
    async fn test_no_candidate_lands_in_manual() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![priority_field(false)];

        let result = engine
            .run_extraction(
                "nothing priority-shaped here",
                &fields,
                WorkItemType::Task,
                &configs(vec![config("priority")]),
                &ExtractionPreferences::default(),
                None,
                today(),
            )
            .await;

        assert_eq!(result.manual_fields, vec!["priority"]);
        assert_partition_invariant(&result);
    }

    #[tokio::test]
    async fn test_unconfigured_required_field_uses_global_rules() {
        let engine = ExtractionPolicyEngine::new();
        // 0.8 pattern confidence ≥ global 0.7 AND ≥ 0.8 floor → auto
        let fields = vec![priority_field(true)];

        let result = engine
            .run_extraction(
                "this is critical",
                &fields,
                WorkItemType::Bug,
                &HashMap::new(),
                &ExtractionPreferences::default(),
                None,
                today(),
            )
            .await;

        assert_eq!(
            result.auto_applied.get("priority"),
            Some(&CandidateValue::text("Highest"))
        );
        assert_partition_invariant(&result);
    }

    #[tokio::test]
    async fn test_unconfigured_required_mid_confidence_confirms() {
        let engine = ExtractionPolicyEngine::new();
        // Components pattern confidence is 0.7: ≥ global 0.7 but < 0.8 floor
        let fields = vec![field(
            "components",
            "Components",
            FieldType::Multiselect,
            &["Billing", "Search"],
            true,
        )];

        let result = engine
            .run_extraction(
                "billing is broken",
                &fields,
                WorkItemType::Bug,
                &HashMap::new(),
                &ExtractionPreferences::default(),
                None,
                today(),
            )
            .await;

        assert!(result.requires_confirmation.contains_key("components"));
        assert!(result.auto_applied.is_empty());
        assert_partition_invariant(&result);
    }

    #[tokio::test]
    async fn test_unconfigured_required_low_confidence_is_manual() {
        let engine = ExtractionPolicyEngine::new();
        // Quarter current-date fallback scores 0.4 — below the global 0.7
        let fields = vec![field(
            "customfield_10021",
            "Delivery Quarter",
            FieldType::Select,
            &["Q2 2025"],
            true,
        )];

        let result = engine
            .run_extraction(
                "no dates mentioned",
                &fields,
                WorkItemType::Story,
                &HashMap::new(),
                &ExtractionPreferences::default(),
                None,
                today(),
            )
            .await;

        assert_eq!(result.manual_fields, vec!["customfield_10021"]);
        assert_partition_invariant(&result);
    }

    #[tokio::test]
    async fn test_unconfigured_optional_field_not_processed() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![priority_field(false)];

        let result = engine
            .run_extraction(
                "this is critical",
                &fields,
                WorkItemType::Task,
                &HashMap::new(),
                &ExtractionPreferences::default(),
                None,
                today(),
            )
            .await;

        assert_eq!(result.extraction_summary.total_fields, 0);
        assert!(result.auto_applied.is_empty());
        assert!(result.manual_fields.is_empty());
    }

    #[tokio::test]
    async fn test_manual_fields_preserve_processing_order() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![
            field("zeta", "Zeta", FieldType::Text, &[], true),
            field("alpha", "Alpha", FieldType::Text, &[], true),
        ];

        let result = engine
            .run_extraction(
                "no extractable content",
                &fields,
                WorkItemType::Task,
                &HashMap::new(),
                &ExtractionPreferences::default(),
                None,
                today(),
            )
            .await;

        assert_eq!(result.manual_fields, vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn test_legacy_batch_rethrows_provider_failure() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![priority_field(false)];
        let ai = MockAi::failing();

        let outcome = engine
            .extract_field_values("critical", &fields, Some(&ai), today())
            .await;

        assert!(outcome.is_err(), "legacy path must surface provider failure");
    }

    #[tokio::test]
    async fn test_legacy_batch_pattern_fills_fields_ai_missed() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![
            priority_field(false),
            field("customfield_10016", "Story Points", FieldType::Number, &[], false),
        ];
        let ai = MockAi::with(vec![ai_value("priority", "High", 0.9)]);

        let values = engine
            .extract_field_values("needs 3 points", &fields, Some(&ai), today())
            .await
            .unwrap();

        assert_eq!(values.len(), 2);
        assert_eq!(values[0].method, ExtractionMethod::Ai);
        assert!(values
            .iter()
            .any(|v| v.field_id == "customfield_10016"
                && v.method == ExtractionMethod::Pattern));
    }

    #[tokio::test]
    async fn test_legacy_batch_without_ai_is_pattern_only() {
        let engine = ExtractionPolicyEngine::new();
        let fields = vec![priority_field(false)];

        let values = engine
            .extract_field_values("critical issue", &fields, None, today())
            .await
            .unwrap();

        assert_eq!(values.len(), 1);
        assert_eq!(values[0].method, ExtractionMethod::Pattern);
    }
}
