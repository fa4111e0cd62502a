use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::catalog::FetchError;
use crate::models::ResponseStatus;

/// Upper bounds (inclusive, milliseconds) of the latency histogram buckets
const LATENCY_BUCKETS_MS: [u64; 10] = [1, 2, 5, 10, 25, 50, 100, 250, 500, 1000];

/// Error classes tracked alongside request statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    DeadlineExceeded,
    ConcurrencyLimit,
    Internal,
    FetchUnreachable,
    FetchTimeout,
    FetchMalformed,
}

impl ErrorClass {
    const ALL: [ErrorClass; 7] = [
        ErrorClass::BadRequest,
        ErrorClass::DeadlineExceeded,
        ErrorClass::ConcurrencyLimit,
        ErrorClass::Internal,
        ErrorClass::FetchUnreachable,
        ErrorClass::FetchTimeout,
        ErrorClass::FetchMalformed,
    ];

    fn name(&self) -> &'static str {
        match self {
            ErrorClass::BadRequest => "bad_request",
            ErrorClass::DeadlineExceeded => "deadline_exceeded",
            ErrorClass::ConcurrencyLimit => "concurrency_limit",
            ErrorClass::Internal => "internal",
            ErrorClass::FetchUnreachable => "fetch_unreachable",
            ErrorClass::FetchTimeout => "fetch_timeout",
            ErrorClass::FetchMalformed => "fetch_malformed",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|c| c == self).unwrap_or(0)
    }
}

impl From<&FetchError> for ErrorClass {
    fn from(error: &FetchError) -> Self {
        match error {
            FetchError::Unreachable(_) => ErrorClass::FetchUnreachable,
            FetchError::Timeout => ErrorClass::FetchTimeout,
            FetchError::MalformedResponse(_) => ErrorClass::FetchMalformed,
        }
    }
}

/// Process-wide metrics sink
///
/// Every field is an atomic so the collector can be shared behind an `Arc`
/// and written from request tasks and the refresh loop without locking.
#[derive(Debug, Default)]
pub struct Metrics {
    requests: [AtomicU64; 5],
    errors: [AtomicU64; 7],
    latency_buckets: [AtomicU64; LATENCY_BUCKETS_MS.len() + 1],
    latency_count: AtomicU64,
    latency_sum_us: AtomicU64,
    cache_staleness_secs: AtomicU64,
    snapshot_version: AtomicU64,
    consecutive_refresh_failures: AtomicU64,
    refresh_successes: AtomicU64,
    refresh_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed request with its final status and latency
    pub fn record_request(&self, status: ResponseStatus, latency: Duration) {
        self.requests[status_index(status)].fetch_add(1, Ordering::Relaxed);

        let latency_ms = latency.as_millis() as u64;
        let bucket = LATENCY_BUCKETS_MS
            .iter()
            .position(|bound| latency_ms <= *bound)
            .unwrap_or(LATENCY_BUCKETS_MS.len());
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self, class: ErrorClass) {
        self.errors[class.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_cache_staleness(&self, staleness: Duration) {
        self.cache_staleness_secs
            .store(staleness.as_secs(), Ordering::Relaxed);
    }

    pub fn record_refresh_success(&self, version: u64) {
        self.refresh_successes.fetch_add(1, Ordering::Relaxed);
        self.snapshot_version.store(version, Ordering::Relaxed);
        self.consecutive_refresh_failures.store(0, Ordering::Relaxed);
    }

    pub fn record_refresh_failure(&self, error: &FetchError, consecutive_failures: u32) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_refresh_failures
            .store(consecutive_failures as u64, Ordering::Relaxed);
        self.record_error(ErrorClass::from(error));
    }

    pub fn requests_with_status(&self, status: ResponseStatus) -> u64 {
        self.requests[status_index(status)].load(Ordering::Relaxed)
    }

    pub fn errors_of_class(&self, class: ErrorClass) -> u64 {
        self.errors[class.index()].load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every metric, suitable for serialization
    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests_by_status = ResponseStatus::ALL
            .iter()
            .map(|status| (status.as_str(), self.requests_with_status(*status)))
            .collect();

        let errors_by_class = ErrorClass::ALL
            .iter()
            .map(|class| (class.name(), self.errors_of_class(*class)))
            .collect();

        let mut buckets: Vec<LatencyBucket> = LATENCY_BUCKETS_MS
            .iter()
            .enumerate()
            .map(|(i, bound)| LatencyBucket {
                le_ms: Some(*bound),
                count: self.latency_buckets[i].load(Ordering::Relaxed),
            })
            .collect();
        buckets.push(LatencyBucket {
            le_ms: None,
            count: self.latency_buckets[LATENCY_BUCKETS_MS.len()].load(Ordering::Relaxed),
        });

        MetricsSnapshot {
            requests_by_status,
            errors_by_class,
            latency: LatencyHistogram {
                buckets,
                count: self.latency_count.load(Ordering::Relaxed),
                sum_ms: self.latency_sum_us.load(Ordering::Relaxed) as f64 / 1000.0,
            },
            cache_staleness_secs: self.cache_staleness_secs.load(Ordering::Relaxed),
            snapshot_version: self.snapshot_version.load(Ordering::Relaxed),
            consecutive_refresh_failures: self.consecutive_refresh_failures.load(Ordering::Relaxed),
            refresh_successes: self.refresh_successes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
        }
    }
}

fn status_index(status: ResponseStatus) -> usize {
    match status {
        ResponseStatus::Ok => 0,
        ResponseStatus::OkDegraded => 1,
        ResponseStatus::BadRequest => 2,
        ResponseStatus::DeadlineExceeded => 3,
        ResponseStatus::Internal => 4,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyBucket {
    /// `None` is the overflow bucket
    pub le_ms: Option<u64>,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyHistogram {
    pub buckets: Vec<LatencyBucket>,
    pub count: u64,
    pub sum_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_by_status: BTreeMap<&'static str, u64>,
    pub errors_by_class: BTreeMap<&'static str, u64>,
    pub latency: LatencyHistogram,
    pub cache_staleness_secs: u64,
    pub snapshot_version: u64,
    pub consecutive_refresh_failures: u64,
    pub refresh_successes: u64,
    pub refresh_failures: u64,
}
