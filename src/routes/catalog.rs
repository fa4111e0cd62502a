use axum::{extract::State, Extension, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::{catalog::RefreshOutcome, middleware::request_id::RequestId, routes::AppState};

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub outcome: &'static str,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs a catalog refresh immediately
///
/// Reports `skipped` when the background loop is already refreshing.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> Json<RefreshResponse> {
    let cache = state.service.cache();
    let outcome = cache.refresh_once().await;

    tracing::info!(
        request_id = %request_id,
        outcome = outcome.label(),
        "Manual catalog refresh"
    );

    let error = match &outcome {
        RefreshOutcome::Failed { error, .. } => Some(error.to_string()),
        _ => None,
    };

    Json(RefreshResponse {
        outcome: outcome.label(),
        version: cache.current().version(),
        error,
    })
}
