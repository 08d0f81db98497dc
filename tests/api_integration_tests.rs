//! Integration Tests for API Endpoints
//!
//! Drives the full router (middleware included) request by request.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use futures::future::join_all;
use serde_json::Value;
use tokio_test::assert_ok;
use tower::ServiceExt;
use tokio::sync::RwLock;
use user_cache_gateway::{
    api::create_router, cache::CacheStore, store::MockUserStore, AppState, Config,
    LookupCoordinator, RateLimiter,
};

// == Helper Functions ==

fn test_config() -> Config {
    Config {
        queue_delay_ms: 20,
        ..Config::default()
    }
}

fn create_test_app() -> (Router, AppState) {
    let state = AppState::from_config(&test_config());
    (create_router(state.clone()), state)
}

/// Same wiring as `AppState::from_config`, keeping a handle on the store.
fn create_test_app_with_store() -> (Router, AppState, Arc<MockUserStore>) {
    let config = test_config();
    let store = Arc::new(MockUserStore::new());
    let cache = CacheStore::new(config.cache_max_entries, config.cache_ttl_ms);
    let users = LookupCoordinator::new(
        Arc::clone(&store),
        Arc::new(RwLock::new(cache)),
        config.queue_concurrency,
        config.queue_delay(),
    );
    let state = AppState::new(users, Arc::new(RateLimiter::new(config.rate_limit())));
    (create_router(state.clone()), state, store)
}

/// Builds a request from a distinct forwarded client, so each test can stay
/// under the per-client rate limit.
fn request(method: &str, uri: &str, client: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", client)
        .header("content-type", "application/json")
        .body(body)
        .unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// == GET /users/:id ==

#[tokio::test]
async fn test_get_user_success() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(request("GET", "/users/1", "10.0.0.1", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["id"], 1);
    assert_eq!(json["name"], "John Doe");
    assert_eq!(json["email"], "john@example.com");
}

#[tokio::test]
async fn test_get_user_invalid_id() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(request("GET", "/users/abc", "10.0.0.2", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "Invalid user ID");
}

#[tokio::test]
async fn test_get_unknown_user_leaves_cache_untouched() {
    let (app, state) = create_test_app();

    let response = app
        .oneshot(request("GET", "/users/999", "10.0.0.3", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "User with ID 999 not found");

    assert_eq!(state.users.cache_stats().await.size, 0);
    assert_eq!(state.users.in_flight_count().await, 0);
}

#[tokio::test]
async fn test_concurrent_requests_are_deduplicated() {
    let (app, state, store) = create_test_app_with_store();

    let responses = join_all((0..4).map(|i| {
        let app = app.clone();
        let client = format!("10.1.0.{}", i);
        async move {
            app.oneshot(request("GET", "/users/2", &client, Body::empty()))
                .await
                .unwrap()
        }
    }))
    .await;

    for response in responses {
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_to_json(response.into_body()).await;
        assert_eq!(json["name"], "Jane Smith");
    }

    // Every caller missed the cache, but only one reached the store
    assert_eq!(store.fetch_count(), 1);
    let stats = state.users.cache_stats().await;
    assert_eq!(stats.size, 1);
    assert_eq!(stats.hits + stats.misses, 4);
}

// == POST /users ==

#[tokio::test]
async fn test_create_user_is_cached() {
    let (app, state) = create_test_app();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/users",
            "10.0.0.4",
            Body::from(r#"{"name":"Bob","email":"bob@example.com"}"#),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_to_json(response.into_body()).await;
    assert_eq!(created["id"], 4);

    let response = app
        .oneshot(request("GET", "/users/4", "10.0.0.4", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_json(response.into_body()).await, created);

    let stats = state.users.cache_stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 0);
}

#[tokio::test]
async fn test_create_user_missing_fields() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(request(
            "POST",
            "/users",
            "10.0.0.5",
            Body::from(r#"{"name":"Bob"}"#),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "Name and email are required");
}

// == Cache endpoints ==

#[tokio::test]
async fn test_cache_status_and_clear() {
    let (app, _) = create_test_app();

    let response = app
        .clone()
        .oneshot(request("GET", "/users/3", "10.0.0.6", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request("GET", "/cache-status", "10.0.0.6", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["size"], 1);
    assert_eq!(json["misses"], 1);
    // The first request has been timed by the time this one runs
    assert!(json["requestCount"].as_u64().unwrap() >= 1);
    assert!(json.get("averageResponseTime").is_some());
    assert!(json.get("totalResponseTime").is_some());

    let response = app
        .clone()
        .oneshot(request("DELETE", "/cache", "10.0.0.6", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["message"], "Cache cleared successfully");

    let response = app
        .oneshot(request("GET", "/cache-status", "10.0.0.6", Body::empty()))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["size"], 0);
    // Counters survive a clear
    assert_eq!(json["misses"], 1);
}

#[tokio::test]
async fn test_health() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(request("GET", "/health", "10.0.0.7", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
}

// == Rate limiting ==

#[tokio::test]
async fn test_burst_limit_returns_429() {
    let (app, _) = create_test_app();
    let burst = test_config().rate_limit_burst_max_requests;

    for _ in 0..burst {
        let response = app
            .clone()
            .oneshot(request("GET", "/health", "192.0.2.1", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(request("GET", "/health", "192.0.2.1", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let retry_header: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "Too many requests");
    let retry_after = json["retryAfter"].as_u64().unwrap();
    assert_eq!(retry_after, retry_header);
    assert!(retry_after > 0 && retry_after <= 10);

    // A different client is unaffected
    let response = app
        .oneshot(request("GET", "/health", "192.0.2.2", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unidentified_clients_share_a_bucket() {
    let (app, state) = create_test_app();

    for _ in 0..test_config().rate_limit_burst_max_requests {
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(state.limiter.tracked_clients(), 1);
}

// == Coordinator through the public API ==

#[tokio::test]
async fn test_coordinator_direct_use() {
    let (_, state) = create_test_app();

    let user = assert_ok!(state.users.get_by_id(1).await);
    assert_eq!(user.id, 1);
    assert_eq!(state.users.queue().pending(), 0);
    assert_eq!(state.users.queue().active_workers(), 0);
}
