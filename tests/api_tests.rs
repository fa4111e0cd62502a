use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::time::Instant;

use recommendation_server::{
    catalog::{CatalogClient, FetchError},
    config::Config,
    models::{CatalogSnapshot, Product},
    routes::{create_router, AppState},
};

/// Catalog that answers every fetch the same way
struct FixedCatalog(Result<Vec<Product>, FetchError>);

#[async_trait::async_trait]
impl CatalogClient for FixedCatalog {
    async fn fetch(&self, _deadline: Instant) -> Result<CatalogSnapshot, FetchError> {
        let products = self.0.clone()?;
        CatalogSnapshot::try_from_products(products, Utc::now())
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))
    }
}

fn seed_products() -> Vec<Product> {
    vec![
        Product::new("kettle", "Kettle", 25.0)
            .with_categories(["kitchen"])
            .with_popularity(5.0),
        Product::new("mug", "Mug", 6.0)
            .with_categories(["kitchen"])
            .with_popularity(5.0),
        Product::new("drill", "Drill", 80.0)
            .with_categories(["tools"])
            .with_popularity(1.0),
    ]
}

fn create_test_server(
    client: FixedCatalog,
    seed: CatalogSnapshot,
) -> TestServer {
    let config = Config::default();
    let state = Arc::new(AppState::from_config(&config, Arc::new(client), seed));
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

fn fresh_seed() -> CatalogSnapshot {
    CatalogSnapshot::try_from_products(seed_products(), Utc::now()).unwrap()
}

#[tokio::test]
async fn test_health_check_healthy_with_fresh_seed() {
    let server = create_test_server(FixedCatalog(Ok(seed_products())), fresh_seed());

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["cache"]["product_count"], 3);
    assert_eq!(body["cache"]["version"], 0);
}

#[tokio::test]
async fn test_health_check_degraded_without_catalog() {
    let server = create_test_server(
        FixedCatalog(Err(FetchError::Unreachable("down".into()))),
        CatalogSnapshot::empty(),
    );

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "degraded");
    assert!(body["cache"]["last_success"].is_null());
}

#[tokio::test]
async fn test_recommendations_ranked_with_tie_break() {
    let server = create_test_server(FixedCatalog(Ok(seed_products())), fresh_seed());

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({
            "user_id": "user-42",
            "count": 2
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["product_ids"], json!(["kettle", "mug"]));
    assert_eq!(body["snapshot_version"], 0);
    assert_eq!(body["candidates_considered"], 3);
}

#[tokio::test]
async fn test_recommendations_echo_request_id() {
    let server = create_test_server(FixedCatalog(Ok(seed_products())), fresh_seed());
    let request_id = "5f0c6f4e-8d4a-4c55-9d7e-1b0e4f2a9c11";

    let response = server
        .post("/api/v1/recommendations")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static(request_id),
        )
        .json(&json!({ "count": 1 }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("x-request-id"), request_id);
}

#[tokio::test]
async fn test_recommendations_with_exclusions_and_filter() {
    let server = create_test_server(FixedCatalog(Ok(seed_products())), fresh_seed());

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({
            "exclusion_ids": ["kettle"],
            "category_filter": ["kitchen", "tools"],
            "count": 5
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["product_ids"], json!(["mug", "drill"]));
    assert_eq!(body["candidates_considered"], 2);
}

#[tokio::test]
async fn test_excluding_everything_is_empty_ok() {
    let server = create_test_server(FixedCatalog(Ok(seed_products())), fresh_seed());

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({
            "exclusion_ids": ["kettle", "mug", "drill"],
            "count": 3
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["product_ids"], json!([]));
    assert_eq!(body["candidates_considered"], 0);
}

#[tokio::test]
async fn test_invalid_counts_are_bad_requests() {
    let server = create_test_server(FixedCatalog(Ok(seed_products())), fresh_seed());

    for count in [0, -1, 1000] {
        let response = server
            .post("/api/v1/recommendations")
            .json(&json!({ "count": count }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["status"], "BAD_REQUEST");
    }
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let server = create_test_server(FixedCatalog(Ok(seed_products())), fresh_seed());

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "count": "several" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["status"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_missing_count_is_bad_request_and_counted() {
    let server = create_test_server(FixedCatalog(Ok(seed_products())), fresh_seed());

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "user_id": "u" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["status"], "BAD_REQUEST");
    assert!(body["error"].as_str().unwrap().contains("count"));

    let metrics: Value = server.get("/metrics").await.json();
    assert_eq!(metrics["requests_by_status"]["BAD_REQUEST"], 1);
    assert_eq!(metrics["errors_by_class"]["bad_request"], 1);
}

#[tokio::test]
async fn test_manual_refresh_publishes_new_version() {
    let catalog = vec![
        Product::new("lamp", "Lamp", 40.0).with_popularity(9.0),
        Product::new("rug", "Rug", 120.0).with_popularity(2.0),
    ];
    let server = create_test_server(FixedCatalog(Ok(catalog)), CatalogSnapshot::empty());

    let before = server
        .post("/api/v1/recommendations")
        .json(&json!({ "count": 5 }))
        .await;
    before.assert_status_ok();
    let body: Value = before.json();
    assert_eq!(body["product_ids"], json!([]));

    let refresh = server.post("/api/v1/catalog/refresh").await;
    refresh.assert_status_ok();
    let body: Value = refresh.json();
    assert_eq!(body["outcome"], "published");
    assert_eq!(body["version"], 1);

    let after = server
        .post("/api/v1/recommendations")
        .json(&json!({ "count": 5 }))
        .await;
    after.assert_status_ok();
    let body: Value = after.json();
    assert_eq!(body["snapshot_version"], 1);
    assert_eq!(body["product_ids"], json!(["lamp", "rug"]));
}

#[tokio::test]
async fn test_failed_refresh_keeps_serving_seed() {
    let server = create_test_server(
        FixedCatalog(Err(FetchError::Unreachable("connection refused".into()))),
        fresh_seed(),
    );

    let refresh = server.post("/api/v1/catalog/refresh").await;
    refresh.assert_status_ok();
    let body: Value = refresh.json();
    assert_eq!(body["outcome"], "failed");
    assert_eq!(body["version"], 0);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "count": 1 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["product_ids"], json!(["kettle"]));

    let health: Value = server.get("/health").await.json();
    assert_eq!(health["cache"]["consecutive_failures"], 1);
}

#[tokio::test]
async fn test_metrics_count_requests_by_status() {
    let server = create_test_server(FixedCatalog(Ok(seed_products())), fresh_seed());

    server
        .post("/api/v1/recommendations")
        .json(&json!({ "count": 2 }))
        .await
        .assert_status_ok();
    server
        .post("/api/v1/recommendations")
        .json(&json!({ "count": 0 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = server.get("/metrics").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["requests_by_status"]["OK"], 1);
    assert_eq!(body["requests_by_status"]["BAD_REQUEST"], 1);
    assert_eq!(body["errors_by_class"]["bad_request"], 1);
    assert_eq!(body["latency"]["count"], 2);
}
