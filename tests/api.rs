//! Listing API through the full router, without a network listener.

#![allow(clippy::panic)]

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use chrono::Utc;
use tower::ServiceExt;

use shopwatch::api::build_router;
use shopwatch::app_state::AppState;
use shopwatch::domain::ProductListing;
use shopwatch::persistence::{MemoryStore, ProductStore};

const KEY: &str = "test-key";

async fn app() -> axum::Router {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    let batch = [
        ProductListing::new("Lamp", "A", 10, "https://a.test/lamp", now),
        ProductListing::new("Chair", "B", 25, "https://b.test/chair", now),
    ];
    tokio_test::assert_ok!(store.merge(&batch).await);
    let cheaper = ProductListing::new("Lamp", "A", 8, "https://a.test/lamp", now);
    tokio_test::assert_ok!(store.merge(&[cheaper]).await);

    build_router(AppState::new(store as Arc<dyn ProductStore>, KEY))
}

fn get(uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(key) = key {
        builder = builder.header("X-API-KEY", key);
    }
    let Ok(request) = builder.body(Body::empty()) else {
        panic!("valid request");
    };
    request
}

async fn json(response: axum::response::Response) -> serde_json::Value {
    let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
        panic!("readable body");
    };
    let Ok(value) = serde_json::from_slice(&bytes) else {
        panic!("json body");
    };
    value
}

#[tokio::test]
async fn products_require_the_api_key() {
    for key in [None, Some("wrong"), Some("")] {
        let Ok(response) = app().await.oneshot(get("/products", key)).await else {
            panic!("router failed");
        };
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "key {key:?}");
        let body = json(response).await;
        assert_eq!(body["error"]["code"], 2001);
    }
}

#[tokio::test]
async fn products_are_listed_in_camel_case() {
    let Ok(response) = app().await.oneshot(get("/products", Some(KEY))).await else {
        panic!("router failed");
    };
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    let Some(rows) = body.as_array() else {
        panic!("array body");
    };
    assert_eq!(rows.len(), 2);

    let (Some(lamp), Some(chair)) = (rows.first(), rows.get(1)) else {
        panic!("two rows");
    };
    assert_eq!(lamp["name"], "Lamp");
    assert_eq!(lamp["price"], 8);
    assert_eq!(lamp["previousPrice"], 10);
    assert_eq!(lamp["notified"], false);
    assert!(lamp.get("firstSeen").is_some());

    assert_eq!(chair["shop"], "B");
    assert!(chair["previousPrice"].is_null());
}

#[tokio::test]
async fn health_is_open() {
    let Ok(response) = app().await.oneshot(get("/health", None)).await else {
        panic!("router failed");
    };
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["status"], "healthy");
}

#[tokio::test]
async fn preflight_passes_without_key() {
    let Ok(request) = Request::builder()
        .method(Method::OPTIONS)
        .uri("/products")
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "GET")
        .header("Access-Control-Request-Headers", "x-api-key")
        .body(Body::empty())
    else {
        panic!("valid request");
    };
    let Ok(response) = app().await.oneshot(request).await else {
        panic!("router failed");
    };
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
