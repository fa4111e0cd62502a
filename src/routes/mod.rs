use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{
    catalog::{CacheSettings, CatalogCache, CatalogClient, SystemClock},
    config::Config,
    metrics::{Metrics, MetricsSnapshot},
    middleware::request_id::{make_span_with_request_id, request_id_middleware},
    models::CatalogSnapshot,
    services::RecommendationService,
};

pub mod catalog;
pub mod recommendations;

/// Shared application state
pub struct AppState {
    pub service: Arc<RecommendationService>,
}

impl AppState {
    pub fn new(service: Arc<RecommendationService>) -> Self {
        Self { service }
    }

    /// Wires metrics, cache and request handler from configuration
    pub fn from_config(
        config: &Config,
        client: Arc<dyn CatalogClient>,
        seed: CatalogSnapshot,
    ) -> Self {
        let metrics = Arc::new(Metrics::new());
        let cache = Arc::new(CatalogCache::new(
            client,
            Arc::new(SystemClock),
            metrics.clone(),
            CacheSettings::from(config),
            seed,
        ));
        let service = RecommendationService::from_config(config, cache, metrics);
        Self::new(Arc::new(service))
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/recommendations", post(recommendations::recommend))
        .route("/catalog/refresh", post(catalog::refresh))
}

/// Health check endpoint
///
/// Always 200; a stale or never-fetched catalog reports `degraded`.
async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let health = state.service.cache().health();
    let status = if health.is_degraded() {
        "degraded"
    } else {
        "healthy"
    };
    (StatusCode::OK, Json(json!({ "status": status, "cache": health })))
}

/// Metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    state.service.cache().report_staleness();
    Json(state.service.metrics().snapshot())
}
