mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;

use classdesk::router::init_router;
use classdesk_config::{RateLimitConfig, SecurityConfig};

use common::{test_state_with, unreachable_pool};

fn strict_app() -> Router {
    let rate_limit_config = RateLimitConfig {
        general_per_second: 1,
        general_burst_size: 3,
        auth_per_second: 1,
        auth_burst_size: 2,
    };
    let security_config = SecurityConfig {
        csrf_enabled: false,
        ..SecurityConfig::default()
    };
    init_router(test_state_with(
        unreachable_pool(),
        security_config,
        rate_limit_config,
    ))
}

fn get_from(uri: &str, client: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_auth_endpoints_are_limited_per_client() {
    let app = strict_app();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(get_from("/api/auth/me", "203.0.113.10"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app
        .clone()
        .oneshot(get_from("/api/auth/me", "203.0.113.10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get("retry-after").is_some());

    let response = app
        .oneshot(get_from("/api/auth/me", "203.0.113.11"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_general_bucket_is_separate_from_auth_bucket() {
    let app = strict_app();

    for _ in 0..2 {
        app.clone()
            .oneshot(get_from("/api/auth/me", "198.51.100.4"))
            .await
            .unwrap();
    }

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(get_from("/api/students", "198.51.100.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app
        .oneshot(get_from("/api/students", "198.51.100.4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let app = strict_app();

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(get_from("/health", "192.0.2.50"))
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
