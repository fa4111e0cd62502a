use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::models::{CatalogSnapshot, Product, RecommendationRequest, RecommendationResponse};

/// Errors raised by the recommendation engine
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("requested count {requested} must be between 1 and {max}")]
    InvalidCount { requested: usize, max: usize },

    /// Snapshot validation should make this impossible
    #[error("product {0} appears more than once among candidates")]
    DuplicateCandidate(String),
}

/// Scores a candidate product; higher ranks first
///
/// Scores must be finite. Ties are broken by ascending product identifier.
pub trait Scorer: Send + Sync {
    fn score(&self, product: &Product, request: &RecommendationRequest) -> f64;
}

/// Ranks purely on the catalog's popularity weight
#[derive(Debug, Default, Clone, Copy)]
pub struct PopularityScorer;

impl Scorer for PopularityScorer {
    fn score(&self, product: &Product, _request: &RecommendationRequest) -> f64 {
        product.popularity
    }
}

struct Candidate<'a> {
    id: &'a str,
    score: f64,
}

/// Score descending, then identifier ascending
fn rank_order(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(b.id))
}

/// Filter, score and rank pipeline over a catalog snapshot
///
/// Holds no mutable state, so one engine is shared by every request task.
#[derive(Clone)]
pub struct RecommendationEngine {
    max_count: usize,
    scorer: Arc<dyn Scorer>,
}

impl RecommendationEngine {
    pub fn new(max_count: usize) -> Self {
        Self::with_scorer(max_count, Arc::new(PopularityScorer))
    }

    pub fn with_scorer(max_count: usize, scorer: Arc<dyn Scorer>) -> Self {
        Self { max_count, scorer }
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Produces the ranked recommendations for `request` against `snapshot`
    ///
    /// An empty snapshot, or filters that exclude everything, yield an empty response
    /// rather than an error.
    pub fn recommend(
        &self,
        request: &RecommendationRequest,
        snapshot: &CatalogSnapshot,
    ) -> Result<RecommendationResponse, EngineError> {
        if request.count == 0 || request.count > self.max_count {
            return Err(EngineError::InvalidCount {
                requested: request.count,
                max: self.max_count,
            });
        }

        let excluded: HashSet<&str> = request.exclusions.iter().map(String::as_str).collect();
        let category_filter = request
            .category_filter
            .as_ref()
            .filter(|filter| !filter.is_empty());

        let mut seen = HashSet::with_capacity(snapshot.len());
        let mut candidates = Vec::with_capacity(snapshot.len());

        for product in snapshot.products() {
            if excluded.contains(product.id.as_str()) {
                continue;
            }
            if let Some(filter) = category_filter {
                if !product.matches_any(filter) {
                    continue;
                }
            }
            if !seen.insert(product.id.as_str()) {
                return Err(EngineError::DuplicateCandidate(product.id.clone()));
            }

            candidates.push(Candidate {
                id: &product.id,
                score: self.scorer.score(product, request),
            });
        }

        let candidates_considered = candidates.len();

        // Partial selection keeps ranking cost near-linear for large catalogs.
        if candidates.len() > request.count {
            candidates.select_nth_unstable_by(request.count - 1, rank_order);
            candidates.truncate(request.count);
        }
        candidates.sort_unstable_by(rank_order);

        Ok(RecommendationResponse {
            product_ids: candidates.into_iter().map(|c| c.id.to_string()).collect(),
            snapshot_version: snapshot.version(),
            candidates_considered,
        })
    }
}
