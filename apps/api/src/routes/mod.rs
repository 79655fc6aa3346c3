pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::extraction::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Field catalog API
        .route(
            "/api/v1/fields/normalize",
            post(handlers::handle_normalize_fields),
        )
        .route(
            "/api/v1/fields/infer-from-error",
            post(handlers::handle_infer_from_error),
        )
        // Extraction API
        .route(
            "/api/v1/extraction/run",
            post(handlers::handle_run_extraction),
        )
        .route(
            "/api/v1/extraction/batch",
            post(handlers::handle_batch_extraction),
        )
        .route(
            "/api/v1/extraction/suggest",
            post(handlers::handle_suggest),
        )
        // Issue-type mapping API
        .route(
            "/api/v1/issue-types/resolve",
            post(handlers::handle_resolve_issue_type),
        )
        .with_state(state)
}
