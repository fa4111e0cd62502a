//! Catalog integration
//!
//! The client talks to the remote catalog service, the cache owns the published
//! snapshot and keeps it fresh in the background.

use anyhow::Context;
use chrono::{DateTime, Utc};
use std::path::Path;

use crate::models::{CatalogSnapshot, Product};

pub mod cache;
pub mod client;
pub mod clock;
pub mod schedule;

pub use cache::{CacheHealth, CacheSettings, CatalogCache, RefreshLoopHandle, RefreshOutcome};
pub use client::{CatalogClient, FetchError, HttpCatalogClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use schedule::RefreshSchedule;

/// Loads a JSON product array as the seed snapshot
///
/// The snapshot is stamped with the file's modification time so a seed shipped with
/// the deployment ages like any other fetch.
pub fn load_seed(path: impl AsRef<Path>) -> anyhow::Result<CatalogSnapshot> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog seed {}", path.display()))?;
    let products: Vec<Product> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse catalog seed {}", path.display()))?;

    let fetched_at: DateTime<Utc> = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    let snapshot = CatalogSnapshot::try_from_products(products, fetched_at)
        .map_err(|e| anyhow::anyhow!("Invalid catalog seed {}: {}", path.display(), e))?;

    tracing::info!(
        path = %path.display(),
        products = snapshot.len(),
        fetched_at = %fetched_at,
        "Loaded catalog seed"
    );

    Ok(snapshot)
}
