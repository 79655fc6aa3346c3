//! Axum route handlers for the Extraction API.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::inference::infer_from_error;
use crate::catalog::issue_types::{resolve_issue_type, WorkItemType};
use crate::catalog::normalizer::{classify, normalize, FieldCategory, FieldDescriptor};
use crate::errors::AppError;
use crate::extraction::policy::{
    EnhancedExtractionResult, ExtractionPreferences, FieldExtractionConfig,
};
use crate::extraction::suggest::suggest;
use crate::extraction::ExtractedFieldValue;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NormalizeFieldsRequest {
    /// Raw field-id → metadata map as returned by the tracker.
    pub fields: Map<String, Value>,
}

/// A normalized descriptor plus its discovery-UI category.
#[derive(Debug, Serialize)]
pub struct CatalogField {
    #[serde(flatten)]
    pub field: FieldDescriptor,
    pub category: FieldCategory,
}

#[derive(Debug, Serialize)]
pub struct NormalizeFieldsResponse {
    pub fields: Vec<CatalogField>,
}

#[derive(Debug, Deserialize)]
pub struct InferFromErrorRequest {
    /// The tracker's failure payload, in whatever shape it arrived.
    pub error: Value,
}

#[derive(Debug, Serialize)]
pub struct InferFromErrorResponse {
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Deserialize)]
pub struct RunExtractionRequest {
    pub text: String,
    /// Raw field metadata; normalized before the run.
    pub fields: Map<String, Value>,
    pub work_item_type: WorkItemType,
    #[serde(default)]
    pub configs: Vec<FieldExtractionConfig>,
    #[serde(default)]
    pub preferences: ExtractionPreferences,
    #[serde(default = "default_use_ai")]
    pub use_ai: bool,
}

fn default_use_ai() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct RunExtractionResponse {
    pub run_id: Uuid,
    pub result: EnhancedExtractionResult,
}

#[derive(Debug, Deserialize)]
pub struct BatchExtractionRequest {
    pub text: String,
    pub fields: Map<String, Value>,
    #[serde(default = "default_use_ai")]
    pub use_ai: bool,
}

#[derive(Debug, Serialize)]
pub struct BatchExtractionResponse {
    pub run_id: Uuid,
    pub values: Vec<ExtractedFieldValue>,
    /// True when the AI batch call failed and results are pattern-only.
    pub degraded_to_patterns: bool,
}

#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    pub field: FieldDescriptor,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveIssueTypeRequest {
    pub work_item_type: WorkItemType,
    pub available_types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveIssueTypeResponse {
    pub issue_type: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/fields/normalize
///
/// Normalizes raw tracker metadata into ordered, categorized descriptors.
pub async fn handle_normalize_fields(
    Json(request): Json<NormalizeFieldsRequest>,
) -> Result<Json<NormalizeFieldsResponse>, AppError> {
    let fields = normalize(&request.fields)
        .into_iter()
        .map(|field| {
            let category = classify(&field);
            CatalogField { field, category }
        })
        .collect();

    Ok(Json(NormalizeFieldsResponse { fields }))
}

/// POST /api/v1/fields/infer-from-error
///
/// Recovers a usable field catalog from a failed-submission error payload.
/// Always returns at least the minimal field set.
pub async fn handle_infer_from_error(
    Json(request): Json<InferFromErrorRequest>,
) -> Result<Json<InferFromErrorResponse>, AppError> {
    let fields = infer_from_error(&request.error, Utc::now().date_naive());
    info!("Inferred {} fields from error payload", fields.len());

    Ok(Json(InferFromErrorResponse { fields }))
}

/// POST /api/v1/extraction/run
///
/// The canonical config-driven extraction pipeline: normalize fields, then
/// classify every eligible field into a result bucket.
pub async fn handle_run_extraction(
    State(state): State<AppState>,
    Json(request): Json<RunExtractionRequest>,
) -> Result<Json<RunExtractionResponse>, AppError> {
    if request.text.trim().is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }

    let fields = normalize(&request.fields);
    let configs: HashMap<String, FieldExtractionConfig> = request
        .configs
        .into_iter()
        .map(|config| (config.jira_field_id.clone(), config))
        .collect();

    let ai = request.use_ai.then(|| state.ai_extractor.as_ref());

    let result = state
        .engine
        .run_extraction(
            &request.text,
            &fields,
            request.work_item_type,
            &configs,
            &request.preferences,
            ai,
            Utc::now().date_naive(),
        )
        .await;

    let run_id = Uuid::new_v4();
    info!(
        "Extraction run {run_id}: {}/{} fields auto-applied",
        result.extraction_summary.auto_applied_count, result.extraction_summary.total_fields
    );

    Ok(Json(RunExtractionResponse { run_id, result }))
}

/// POST /api/v1/extraction/batch
///
/// Deprecated whole-batch path kept for backward compatibility: AI for all
/// fields at once, pattern fill-in, and full pattern fallback when the
/// provider is down.
pub async fn handle_batch_extraction(
    State(state): State<AppState>,
    Json(request): Json<BatchExtractionRequest>,
) -> Result<Json<BatchExtractionResponse>, AppError> {
    if request.text.trim().is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }

    let fields = normalize(&request.fields);
    let today = Utc::now().date_naive();
    let ai = request.use_ai.then(|| state.ai_extractor.as_ref());

    let (values, degraded) = match state
        .engine
        .extract_field_values(&request.text, &fields, ai, today)
        .await
    {
        Ok(values) => (values, false),
        Err(e) => {
            warn!("Batch AI extraction failed ({e}) — falling back to pattern-only");
            (
                state.engine.extract_with_patterns(&request.text, &fields, today),
                true,
            )
        }
    };

    Ok(Json(BatchExtractionResponse {
        run_id: Uuid::new_v4(),
        values,
        degraded_to_patterns: degraded,
    }))
}

/// POST /api/v1/extraction/suggest
///
/// Ranks a field's allowed values against the text to assist manual entry.
pub async fn handle_suggest(
    Json(request): Json<SuggestRequest>,
) -> Result<Json<SuggestResponse>, AppError> {
    if request.text.trim().is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }

    let suggestions = suggest(&request.field, &request.text);
    Ok(Json(SuggestResponse { suggestions }))
}

/// POST /api/v1/issue-types/resolve
///
/// Maps an abstract work-item type onto one of the project's issue types.
pub async fn handle_resolve_issue_type(
    Json(request): Json<ResolveIssueTypeRequest>,
) -> Result<Json<ResolveIssueTypeResponse>, AppError> {
    if request.available_types.is_empty() {
        return Err(AppError::Validation(
            "available_types cannot be empty".to_string(),
        ));
    }

    let issue_type = resolve_issue_type(request.work_item_type, &request.available_types)
        .ok_or_else(|| AppError::NotFound("No matching issue type".to_string()))?;

    Ok(Json(ResolveIssueTypeResponse { issue_type }))
}
