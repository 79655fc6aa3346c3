use std::sync::Arc;

use crate::extraction::ai::AiExtractor;
use crate::extraction::policy::ExtractionPolicyEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable AI extraction backend. Default: LlmAiExtractor over the
    /// Anthropic Messages API.
    pub ai_extractor: Arc<dyn AiExtractor>,
    /// The policy engine, holding the compiled pattern rules.
    pub engine: Arc<ExtractionPolicyEngine>,
}
