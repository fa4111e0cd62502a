use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Longest product, category or user identifier accepted anywhere in the service
pub const MAX_IDENTIFIER_LEN: usize = 256;

/// Non-blank, at most [`MAX_IDENTIFIER_LEN`] bytes, no control characters
pub fn is_valid_identifier(id: &str) -> bool {
    !id.trim().is_empty() && id.len() <= MAX_IDENTIFIER_LEN && !id.chars().any(char::is_control)
}

/// A catalog product as served by the catalog service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    pub price: f64,
    #[serde(default)]
    pub popularity: f64,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            categories: Vec::new(),
            price,
            popularity: 0.0,
        }
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = popularity;
        self
    }

    /// Returns true if any of the product's tags is in `filter`
    pub fn matches_any(&self, filter: &HashSet<String>) -> bool {
        self.categories.iter().any(|tag| filter.contains(tag))
    }
}

/// Reasons a product list cannot become a snapshot
#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("product at position {0} has an empty identifier")]
    EmptyId(usize),
    #[error("product at position {0} has a malformed identifier")]
    MalformedId(usize),
    #[error("duplicate product identifier: {0}")]
    DuplicateId(String),
    #[error("product {id} has invalid price {price}")]
    InvalidPrice { id: String, price: f64 },
    #[error("product {id} has non-finite popularity")]
    InvalidPopularity { id: String },
}

/// Immutable, versioned view of the full product catalog
///
/// Identifiers are unique within a snapshot. A snapshot is never mutated once
/// published; refreshing the catalog builds a new one.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    version: u64,
    fetched_at: DateTime<Utc>,
    products: Vec<Product>,
}

impl CatalogSnapshot {
    /// The snapshot served before any catalog fetch has succeeded
    pub fn empty() -> Self {
        Self {
            version: 0,
            fetched_at: DateTime::<Utc>::from(std::time::UNIX_EPOCH),
            products: Vec::new(),
        }
    }

    /// Validates `products` and builds an unpublished (version 0) snapshot
    pub fn try_from_products(
        products: Vec<Product>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, SnapshotError> {
        validate_products(&products)?;
        Ok(Self {
            version: 0,
            fetched_at,
            products,
        })
    }

    /// Assigns the version under which the cache publishes this snapshot
    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }
}

fn validate_products(products: &[Product]) -> Result<(), SnapshotError> {
    let mut seen = HashSet::with_capacity(products.len());

    for (position, product) in products.iter().enumerate() {
        if product.id.trim().is_empty() {
            return Err(SnapshotError::EmptyId(position));
        }
        if !is_valid_identifier(&product.id) {
            return Err(SnapshotError::MalformedId(position));
        }
        if !product.price.is_finite() || product.price < 0.0 {
            return Err(SnapshotError::InvalidPrice {
                id: product.id.clone(),
                price: product.price,
            });
        }
        if !product.popularity.is_finite() {
            return Err(SnapshotError::InvalidPopularity {
                id: product.id.clone(),
            });
        }
        if !seen.insert(product.id.as_str()) {
            return Err(SnapshotError::DuplicateId(product.id.clone()));
        }
    }

    Ok(())
}
