use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::catalog::{CatalogClient, Clock, FetchError, RefreshSchedule};
use crate::config::Config;
use crate::metrics::Metrics;
use crate::models::CatalogSnapshot;

/// Timing knobs for the catalog cache
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub fetch_timeout: Duration,
    pub refresh_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_ceiling: Duration,
    pub staleness_threshold: Duration,
}

impl From<&Config> for CacheSettings {
    fn from(config: &Config) -> Self {
        Self {
            fetch_timeout: config.catalog_fetch_timeout(),
            refresh_interval: config.refresh_interval(),
            backoff_base: config.backoff_base(),
            backoff_ceiling: config.backoff_ceiling(),
            staleness_threshold: config.staleness_threshold(),
        }
    }
}

/// Result of a single refresh attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Published { version: u64, next_delay: Duration },
    Failed { error: FetchError, next_delay: Duration },
    /// Another refresh was already in flight
    Skipped,
}

impl RefreshOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Published { .. } => "published",
            RefreshOutcome::Failed { .. } => "failed",
            RefreshOutcome::Skipped => "skipped",
        }
    }
}

/// Health view of the cache
#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    pub version: u64,
    pub product_count: usize,
    pub staleness_secs: u64,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub stale: bool,
}

impl CacheHealth {
    /// Degraded when the catalog is stale or has never been fetched
    pub fn is_degraded(&self) -> bool {
        self.stale || (self.last_success.is_none() && self.product_count == 0)
    }
}

/// Process-wide catalog view
///
/// Readers load the published snapshot with a single atomic pointer read. The only
/// writer is [`CatalogCache::refresh_once`], which holds the schedule lock for the
/// whole attempt so at most one refresh is in flight.
pub struct CatalogCache {
    current: ArcSwap<CatalogSnapshot>,
    client: Arc<dyn CatalogClient>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
    settings: CacheSettings,
    schedule: Mutex<RefreshSchedule>,
    consecutive_failures: AtomicU32,
    refreshed: AtomicBool,
}

/// Handle for stopping the background refresh loop
pub struct RefreshLoopHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RefreshLoopHandle {
    /// Stops the loop and waits for it to exit
    ///
    /// A refresh already running completes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Refresh loop task failed");
        }
        tracing::info!("Catalog refresh loop stopped");
    }
}

impl CatalogCache {
    /// Creates a cache serving `seed` until the first successful refresh
    pub fn new(
        client: Arc<dyn CatalogClient>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
        settings: CacheSettings,
        seed: CatalogSnapshot,
    ) -> Self {
        let schedule = RefreshSchedule::new(
            settings.refresh_interval,
            settings.backoff_base,
            settings.backoff_ceiling,
        );

        Self {
            current: ArcSwap::from_pointee(seed),
            client,
            clock,
            metrics,
            settings,
            schedule: Mutex::new(schedule),
            consecutive_failures: AtomicU32::new(0),
            refreshed: AtomicBool::new(false),
        }
    }

    /// Returns the latest published snapshot without blocking
    pub fn current(&self) -> Arc<CatalogSnapshot> {
        self.current.load_full()
    }

    /// Elapsed time since `snapshot` was fetched, per the cache's clock
    pub fn staleness_of(&self, snapshot: &CatalogSnapshot) -> Duration {
        (self.clock.now() - snapshot.fetched_at())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn staleness(&self) -> Duration {
        self.staleness_of(&self.current.load())
    }

    /// True when `snapshot` has data older than the staleness threshold
    ///
    /// An empty snapshot has nothing to serve stale, so it is never degraded here.
    pub fn is_degraded(&self, snapshot: &CatalogSnapshot) -> bool {
        !snapshot.is_empty() && self.staleness_of(snapshot) > self.settings.staleness_threshold
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn health(&self) -> CacheHealth {
        let snapshot = self.current();
        let staleness = self.staleness_of(&snapshot);
        let last_success = self
            .refreshed
            .load(Ordering::Acquire)
            .then(|| snapshot.fetched_at());

        CacheHealth {
            version: snapshot.version(),
            product_count: snapshot.len(),
            staleness_secs: staleness.as_secs(),
            consecutive_failures: self.consecutive_failures(),
            last_success,
            stale: staleness > self.settings.staleness_threshold,
        }
    }

    /// Pushes the current staleness to the metrics gauge
    pub fn report_staleness(&self) {
        self.metrics.set_cache_staleness(self.staleness());
    }

    /// Runs one fetch-and-publish attempt
    ///
    /// On failure the published snapshot is left untouched. Returns `Skipped` without
    /// contacting the catalog when another refresh holds the schedule.
    pub async fn refresh_once(&self) -> RefreshOutcome {
        let Ok(mut schedule) = self.schedule.try_lock() else {
            tracing::debug!("Catalog refresh already in flight, skipping");
            return RefreshOutcome::Skipped;
        };

        let deadline = Instant::now() + self.settings.fetch_timeout;
        let result = tokio::time::timeout_at(deadline, self.client.fetch(deadline))
            .await
            .unwrap_or(Err(FetchError::Timeout));

        let outcome = match result {
            Ok(snapshot) => {
                let version = self.current.load().version() + 1;
                let snapshot = snapshot.with_version(version);
                let product_count = snapshot.len();
                let fetched_at = snapshot.fetched_at();

                self.current.store(Arc::new(snapshot));
                self.refreshed.store(true, Ordering::Release);
                self.consecutive_failures.store(0, Ordering::Relaxed);
                let next_delay = schedule.record_success(fetched_at);
                self.metrics.record_refresh_success(version);

                tracing::info!(
                    version = version,
                    products = product_count,
                    next_refresh_secs = next_delay.as_secs(),
                    "Catalog snapshot published"
                );

                RefreshOutcome::Published {
                    version,
                    next_delay,
                }
            }
            Err(error) => {
                let next_delay = schedule.record_failure();
                let failures = schedule.consecutive_failures();
                self.consecutive_failures.store(failures, Ordering::Relaxed);
                self.metrics.record_refresh_failure(&error, failures);

                tracing::warn!(
                    error = %error,
                    consecutive_failures = failures,
                    retry_in_ms = next_delay.as_millis() as u64,
                    serving_version = self.current.load().version(),
                    "Catalog refresh failed, keeping current snapshot"
                );

                RefreshOutcome::Failed { error, next_delay }
            }
        };

        self.report_staleness();
        outcome
    }

    /// Spawns the periodic refresh task
    ///
    /// The first refresh runs immediately. Dropping the returned handle without calling
    /// `shutdown` also stops the loop.
    pub fn spawn_refresh_loop(self: &Arc<Self>) -> RefreshLoopHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let cache = Arc::clone(self);

        let task = tokio::spawn(async move {
            tracing::info!("Catalog refresh loop started");
            let mut delay = Duration::ZERO;

            loop {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        delay = match cache.refresh_once().await {
                            RefreshOutcome::Published { next_delay, .. }
                            | RefreshOutcome::Failed { next_delay, .. } => next_delay,
                            RefreshOutcome::Skipped => cache.settings.refresh_interval,
                        };
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        RefreshLoopHandle { shutdown_tx, task }
    }
}
