use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::{
    catalog::CatalogCache,
    config::Config,
    metrics::{ErrorClass, Metrics},
    models::{
        is_valid_identifier, GetRecommendations, RecommendationReply, RecommendationRequest,
        ResponseStatus, MAX_IDENTIFIER_LEN,
    },
    services::engine::{EngineError, RecommendationEngine},
};

/// Request handler for `GetRecommendations`
///
/// Validates the call's shape, bounds concurrency, runs the engine against the cache's
/// current snapshot under the request deadline, and maps every outcome to a
/// [`ResponseStatus`]. Catalog refresh problems never fail a request; they only show up
/// as `OK_DEGRADED` once the served snapshot is stale.
pub struct RecommendationService {
    cache: Arc<CatalogCache>,
    engine: RecommendationEngine,
    limiter: Arc<Semaphore>,
    metrics: Arc<Metrics>,
    default_timeout: Duration,
}

impl RecommendationService {
    pub fn new(
        cache: Arc<CatalogCache>,
        engine: RecommendationEngine,
        metrics: Arc<Metrics>,
        max_concurrent_requests: usize,
        default_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            engine,
            limiter: Arc::new(Semaphore::new(max_concurrent_requests)),
            metrics,
            default_timeout,
        }
    }

    pub fn from_config(config: &Config, cache: Arc<CatalogCache>, metrics: Arc<Metrics>) -> Self {
        Self::new(
            cache,
            RecommendationEngine::new(config.max_recommendations),
            metrics,
            config.max_concurrent_requests,
            config.default_request_timeout(),
        )
    }

    pub fn cache(&self) -> &Arc<CatalogCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Serves one call and records its status and latency
    pub async fn get_recommendations(&self, call: GetRecommendations) -> RecommendationReply {
        let started = Instant::now();
        let reply = self.handle(call, started).await;
        self.metrics.record_request(reply.status, started.elapsed());
        reply
    }

    /// Accounts for a call the transport could not decode into `GetRecommendations`
    pub fn reject_undecodable(&self, reason: impl Into<String>) -> RecommendationReply {
        let started = Instant::now();
        let reply = self.bad_request(reason.into());
        self.metrics.record_request(reply.status, started.elapsed());
        reply
    }

    async fn handle(&self, call: GetRecommendations, started: Instant) -> RecommendationReply {
        let timeout = match call.timeout_ms {
            Some(0) => return self.bad_request("timeout_ms must be positive".to_string()),
            Some(ms) => Duration::from_millis(ms),
            None => self.default_timeout,
        };
        let deadline = started + timeout;

        let request = match parse_request(call) {
            Ok(request) => request,
            Err(message) => return self.bad_request(message),
        };

        let permit = match tokio::time::timeout_at(deadline, self.limiter.clone().acquire_owned())
            .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(e)) => return self.internal(format!("request limiter closed: {}", e)),
            Err(_) => {
                self.metrics.record_error(ErrorClass::ConcurrencyLimit);
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Deadline elapsed waiting for a request slot"
                );
                return self.deadline_exceeded();
            }
        };

        let snapshot = self.cache.current();
        let degraded = self.cache.is_degraded(&snapshot);
        self.metrics
            .set_cache_staleness(self.cache.staleness_of(&snapshot));

        let engine = self.engine.clone();
        let user_id = request.user_id.clone();
        // The permit lives as long as the computation, even after the caller gives up.
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            engine.recommend(&request, &snapshot)
        });

        match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(Ok(response))) => {
                if degraded {
                    tracing::warn!(
                        snapshot_version = response.snapshot_version,
                        staleness_secs = self.cache.staleness().as_secs(),
                        "Serving recommendations from stale catalog"
                    );
                }
                tracing::debug!(
                    user_id = %user_id,
                    returned = response.product_ids.len(),
                    candidates = response.candidates_considered,
                    snapshot_version = response.snapshot_version,
                    "Recommendations computed"
                );
                RecommendationReply::served(response, degraded)
            }
            Ok(Ok(Err(e @ EngineError::InvalidCount { .. }))) => self.bad_request(e.to_string()),
            Ok(Ok(Err(e))) => self.internal(e.to_string()),
            Ok(Err(join_error)) => self.internal(format!("engine task failed: {}", join_error)),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Deadline elapsed before ranking completed"
                );
                self.deadline_exceeded()
            }
        }
    }

    fn bad_request(&self, message: String) -> RecommendationReply {
        self.metrics.record_error(ErrorClass::BadRequest);
        tracing::debug!(reason = %message, "Rejected recommendation request");
        RecommendationReply::failed(ResponseStatus::BadRequest, message)
    }

    fn deadline_exceeded(&self) -> RecommendationReply {
        self.metrics.record_error(ErrorClass::DeadlineExceeded);
        RecommendationReply::failed(ResponseStatus::DeadlineExceeded, "request deadline exceeded")
    }

    /// Logs the detail; the caller only sees a generic message
    fn internal(&self, detail: String) -> RecommendationReply {
        self.metrics.record_error(ErrorClass::Internal);
        tracing::error!(detail = %detail, "Internal error serving recommendations");
        RecommendationReply::failed(ResponseStatus::Internal, "internal error")
    }
}

/// Shape validation of the inbound call
///
/// Range checks on `count` beyond its sign are left to the engine.
fn parse_request(call: GetRecommendations) -> Result<RecommendationRequest, String> {
    let count = usize::try_from(call.count)
        .map_err(|_| format!("count must be positive, got {}", call.count))?;

    if call.user_id.len() > MAX_IDENTIFIER_LEN || call.user_id.chars().any(char::is_control) {
        return Err("user_id is malformed".to_string());
    }

    for id in &call.exclusion_ids {
        if !is_valid_identifier(id) {
            return Err(format!("malformed exclusion id {:?}", id));
        }
    }

    let category_filter = match call.category_filter {
        Some(categories) => {
            if let Some(bad) = categories.iter().find(|c| !is_valid_identifier(c)) {
                return Err(format!("malformed category {:?}", bad));
            }
            Some(categories.into_iter().collect::<HashSet<_>>())
        }
        None => None,
    };

    Ok(RecommendationRequest {
        user_id: call.user_id,
        exclusions: call.exclusion_ids,
        category_filter,
        count,
    })
}
