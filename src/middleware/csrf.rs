//! Double-submit cookie CSRF protection.
//!
//! `GET /api/auth/csrf-token` sets a random token in the `csrf_token` cookie
//! and returns it in the body. Every unsafe request under `/api` must echo it
//! in the `X-CSRF-Token` header.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::warn;

use classdesk_config::security::{CSRF_COOKIE_NAME, CSRF_HEADER_NAME};
use classdesk_core::AppError;

use crate::state::AppState;

const CSRF_TOKEN_BYTES: usize = 32;
const EXEMPT_PATHS: &[&str] = &["/api/auth/csrf-token"];

pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn csrf_cookie(token: String) -> Cookie<'static> {
    Cookie::build((CSRF_COOKIE_NAME, token))
        .path("/")
        .same_site(SameSite::Strict)
        .http_only(true)
        .build()
}

/// Compares digests so the comparison time does not depend on where the
/// inputs first differ.
pub fn tokens_match(cookie: &str, header: &str) -> bool {
    let a = Sha256::digest(cookie.as_bytes());
    let b = Sha256::digest(header.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn requires_csrf(method: &Method, path: &str) -> bool {
    let unsafe_method = matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    unsafe_method && path.starts_with("/api/") && !EXEMPT_PATHS.contains(&path)
}

pub async fn csrf_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Response {
    if !state.security_config.csrf_enabled || !requires_csrf(req.method(), req.uri().path()) {
        return next.run(req).await;
    }

    let cookie = jar.get(CSRF_COOKIE_NAME).map(|c| c.value().to_string());
    let header = req
        .headers()
        .get(CSRF_HEADER_NAME)
        .and_then(|value| value.to_str().ok());

    match (cookie, header) {
        (Some(cookie), Some(header)) if !cookie.is_empty() && tokens_match(&cookie, header) => {
            next.run(req).await
        }
        _ => {
            warn!(method = %req.method(), path = %req.uri().path(), "CSRF token missing or mismatched");
            AppError::forbidden("Invalid or missing CSRF token".to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_hex_and_unique() {
        let a = generate_csrf_token();
        let b = generate_csrf_token();

        assert_eq!(a.len(), CSRF_TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc123", "abc123"));
        assert!(!tokens_match("abc123", "abc124"));
        assert!(!tokens_match("abc123", ""));
    }

    #[test]
    fn test_only_unsafe_api_requests_are_checked() {
        assert!(requires_csrf(&Method::POST, "/api/students"));
        assert!(requires_csrf(&Method::DELETE, "/api/users/1"));
        assert!(requires_csrf(&Method::POST, "/api/auth/login"));
        assert!(!requires_csrf(&Method::GET, "/api/students"));
        assert!(!requires_csrf(&Method::POST, "/api/auth/csrf-token"));
        assert!(!requires_csrf(&Method::POST, "/health"));
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = csrf_cookie("token".to_string());
        assert_eq!(cookie.name(), CSRF_COOKIE_NAME);
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
    }
}
