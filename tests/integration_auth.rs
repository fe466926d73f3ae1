mod common;

use axum::{body::Body, http::Request, http::StatusCode};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

use classdesk::router::init_router;
use classdesk_config::{RateLimitConfig, SecurityConfig};
use classdesk_models::users::UserRole;

use common::{
    TEST_PASSWORD, body_json, create_user, json_request, login, setup_test_app, test_state_with,
    unreachable_pool,
};

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = setup_test_app(unreachable_pool());

    let response = app
        .oneshot(json_request("GET", "/api/students", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Missing authorization header");
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = setup_test_app(unreachable_pool());

    let response = app
        .oneshot(json_request("GET", "/api/users", Some("not.a.jwt"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_with_invalid_email_is_unprocessable() {
    let app = setup_test_app(unreachable_pool());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "not-an-email", "password": "whatever" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_login_missing_field_is_bad_request() {
    let app = setup_test_app(unreachable_pool());

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "admin@school.test" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "password is required");
}

#[tokio::test]
async fn test_csrf_header_required_on_post() {
    let state = test_state_with(
        unreachable_pool(),
        SecurityConfig::default(),
        RateLimitConfig::default(),
    );
    let app = init_router(state);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "admin@school.test", "password": TEST_PASSWORD })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid or missing CSRF token");
}

#[tokio::test]
async fn test_csrf_token_round_trip_passes_the_check() {
    let state = test_state_with(
        unreachable_pool(),
        SecurityConfig::default(),
        RateLimitConfig::default(),
    );
    let app = init_router(state);

    let response = app
        .clone()
        .oneshot(json_request("GET", "/api/auth/csrf-token", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("set-cookie").is_some());
    let token = body_json(response).await["csrf_token"]
        .as_str()
        .unwrap()
        .to_string();

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .header("content-type", "application/json")
        .header("cookie", format!("csrf_token={}", token))
        .header("x-csrf-token", &token)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    // Past the CSRF check, stopped by the missing bearer token.
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_reports_database_down() {
    let app = setup_test_app(unreachable_pool());

    let response = app
        .oneshot(json_request("GET", "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "down");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_success_returns_tokens_and_user(pool: PgPool) {
    let (_, email) = create_user(&pool, UserRole::Teacher).await;
    let app = setup_test_app(pool);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": TEST_PASSWORD })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["access_token"].as_str().is_some());
    assert!(body["refresh_token"].as_str().is_some());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["user"]["role"], "teacher");
    assert!(body["user"].get("password").is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_account_locks_after_repeated_failures(pool: PgPool) {
    let (_, email) = create_user(&pool, UserRole::Parent).await;
    let app = setup_test_app(pool);
    let wrong = json!({ "email": email, "password": "Wrong-password-1" });

    for _ in 0..4 {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/auth/login", None, Some(wrong.clone())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/login", None, Some(wrong)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::LOCKED);

    // The right password does not help while locked.
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": TEST_PASSWORD })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::LOCKED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_refresh_token_is_single_use(pool: PgPool) {
    let (_, email) = create_user(&pool, UserRole::Admin).await;
    let app = setup_test_app(pool);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": TEST_PASSWORD })),
        ))
        .await
        .unwrap();
    let refresh_token = body_json(response).await["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    let body = json!({ "refresh_token": refresh_token });
    let first = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/refresh", None, Some(body.clone())))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let replay = app
        .oneshot(json_request("POST", "/api/auth/refresh", None, Some(body)))
        .await
        .unwrap();
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_logout_revokes_access_token(pool: PgPool) {
    let (_, email) = create_user(&pool, UserRole::Teacher).await;
    let app = setup_test_app(pool);
    let token = login(&app, &email).await;

    let me = app
        .clone()
        .oneshot(json_request("GET", "/api/auth/me", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::OK);

    let logout = app
        .clone()
        .oneshot(json_request("POST", "/api/auth/logout", Some(&token), None))
        .await
        .unwrap();
    assert!(logout.status().is_success());

    let me = app
        .oneshot(json_request("GET", "/api/auth/me", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_roles_gate_route_groups(pool: PgPool) {
    let (_, teacher_email) = create_user(&pool, UserRole::Teacher).await;
    let (_, parent_email) = create_user(&pool, UserRole::Parent).await;
    let app = setup_test_app(pool);

    let teacher = login(&app, &teacher_email).await;
    let parent = login(&app, &parent_email).await;

    let response = app
        .clone()
        .oneshot(json_request("GET", "/api/students", Some(&teacher), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request("GET", "/api/users", Some(&teacher), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(json_request("GET", "/api/students", Some(&parent), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(json_request("GET", "/api/sessions", Some(&parent), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
