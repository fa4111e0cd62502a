//! Catalog service client
//!
//! The catalog service exposes a single "list all products" operation. Paging, if the
//! service does it, is resolved here so callers always receive the full product set.

use chrono::Utc;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::instrument;

use crate::models::{CatalogSnapshot, Product};

/// Failure of a single catalog fetch
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("catalog service unreachable: {0}")]
    Unreachable(String),

    #[error("catalog fetch timed out")]
    Timeout,

    #[error("malformed catalog response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() {
            FetchError::MalformedResponse(e.to_string())
        } else {
            FetchError::Unreachable(e.to_string())
        }
    }
}

/// Trait for catalog sources
///
/// One call is one round trip (or one sequence of page requests) bounded by `deadline`.
/// Implementations do not retry; retry policy belongs to the cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch and validate the full product list
    ///
    /// The returned snapshot is unpublished; the cache assigns its version.
    async fn fetch(&self, deadline: Instant) -> Result<CatalogSnapshot, FetchError>;
}

/// One page of the `GET /products` response
#[derive(Debug, Deserialize)]
struct CatalogPage {
    products: Vec<Product>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// reqwest-backed client for the remote catalog service
#[derive(Clone)]
pub struct HttpCatalogClient {
    http_client: HttpClient,
    base_url: String,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Follows page tokens until the catalog reports no further pages
    async fn fetch_all_pages(&self) -> Result<Vec<Product>, FetchError> {
        let url = format!("{}/products", self.base_url);
        let mut products = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut request = self.http_client.get(&url);
            if let Some(token) = &page_token {
                request = request.query(&[("page_token", token.as_str())]);
            }

            let response = request.send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(FetchError::Unreachable(format!(
                    "catalog returned status {}: {}",
                    status, body
                )));
            }

            let page: CatalogPage = response.json().await?;
            pages += 1;
            products.extend(page.products);

            match page.next_page_token {
                Some(next) if !next.is_empty() => {
                    if page_token.as_deref() == Some(next.as_str()) {
                        return Err(FetchError::MalformedResponse(format!(
                            "catalog repeated page token {}",
                            next
                        )));
                    }
                    page_token = Some(next);
                }
                _ => break,
            }
        }

        tracing::debug!(
            pages = pages,
            products = products.len(),
            "Catalog pages fetched"
        );

        Ok(products)
    }
}

#[async_trait::async_trait]
impl CatalogClient for HttpCatalogClient {
    #[instrument(skip(self))]
    async fn fetch(&self, deadline: Instant) -> Result<CatalogSnapshot, FetchError> {
        // Dropping the in-flight future on expiry aborts the HTTP request.
        let products = tokio::time::timeout_at(deadline, self.fetch_all_pages())
            .await
            .map_err(|_| FetchError::Timeout)??;

        CatalogSnapshot::try_from_products(products, Utc::now())
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::time::Duration;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn deadline_in(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[tokio::test]
    async fn test_fetch_single_page() {
        let router = Router::new().route(
            "/products",
            get(|| async {
                Json(json!({
                    "products": [
                        {"id": "sku-1", "name": "Kettle", "categories": ["kitchen"], "price": 25.0, "popularity": 4.0},
                        {"id": "sku-2", "name": "Mug", "price": 6.5}
                    ]
                }))
            }),
        );
        let client = HttpCatalogClient::new(serve(router).await);

        let snapshot = client.fetch(deadline_in(2_000)).await.unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.version(), 0);
        let kettle = snapshot.get("sku-1").unwrap();
        assert_eq!(kettle.categories, vec!["kitchen".to_string()]);
        assert_eq!(kettle.popularity, 4.0);
        assert_eq!(snapshot.get("sku-2").unwrap().popularity, 0.0);
    }

    #[tokio::test]
    async fn test_fetch_follows_page_tokens() {
        let router = Router::new().route(
            "/products",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let page: Value = match params.get("page_token").map(String::as_str) {
                    None => json!({
                        "products": [{"id": "sku-1", "name": "Kettle", "price": 25.0}],
                        "next_page_token": "p2"
                    }),
                    Some("p2") => json!({
                        "products": [{"id": "sku-2", "name": "Mug", "price": 6.5}],
                        "next_page_token": "p3"
                    }),
                    _ => json!({
                        "products": [{"id": "sku-3", "name": "Teapot", "price": 30.0}],
                        "next_page_token": null
                    }),
                };
                Json(page)
            }),
        );
        let client = HttpCatalogClient::new(format!("{}/", serve(router).await));

        let snapshot = client.fetch(deadline_in(2_000)).await.unwrap();

        let ids: Vec<&str> = snapshot.products().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["sku-1", "sku-2", "sku-3"]);
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_unreachable() {
        let router = Router::new().route(
            "/products",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
        let client = HttpCatalogClient::new(serve(router).await);

        let result = client.fetch(deadline_in(2_000)).await;

        assert!(matches!(result, Err(FetchError::Unreachable(msg)) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_fetch_invalid_body_is_malformed() {
        let router = Router::new().route("/products", get(|| async { "not json" }));
        let client = HttpCatalogClient::new(serve(router).await);

        let result = client.fetch(deadline_in(2_000)).await;

        assert!(matches!(result, Err(FetchError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_fetch_duplicate_ids_is_malformed() {
        let router = Router::new().route(
            "/products",
            get(|| async {
                Json(json!({
                    "products": [
                        {"id": "sku-1", "name": "Kettle", "price": 25.0},
                        {"id": "sku-1", "name": "Kettle", "price": 25.0}
                    ]
                }))
            }),
        );
        let client = HttpCatalogClient::new(serve(router).await);

        let result = client.fetch(deadline_in(2_000)).await;

        assert!(
            matches!(result, Err(FetchError::MalformedResponse(msg)) if msg.contains("sku-1"))
        );
    }

    #[tokio::test]
    async fn test_fetch_repeated_page_token_is_malformed() {
        let router = Router::new().route(
            "/products",
            get(|| async {
                Json(json!({
                    "products": [],
                    "next_page_token": "again"
                }))
            }),
        );
        let client = HttpCatalogClient::new(serve(router).await);

        let result = client.fetch(deadline_in(2_000)).await;

        assert!(matches!(result, Err(FetchError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_fetch_aborts_at_deadline() {
        let router = Router::new().route(
            "/products",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "products": [] }))
            }),
        );
        let client = HttpCatalogClient::new(serve(router).await);

        let started = std::time::Instant::now();
        let result = client.fetch(deadline_in(100)).await;

        assert_eq!(result.unwrap_err(), FetchError::Timeout);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_fetch_closed_port_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = HttpCatalogClient::new(format!("http://{}", addr));

        let result = client.fetch(deadline_in(2_000)).await;

        assert!(matches!(result, Err(FetchError::Unreachable(_))));
    }
}
