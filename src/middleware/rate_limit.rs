//! Per-client rate limiting.
//!
//! Two keyed token buckets are kept in memory: a strict one for
//! `/api/auth/*` and a general one for the rest of `/api`. Clients are keyed
//! by the first `X-Forwarded-For` address, falling back to the socket peer.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    DefaultKeyedRateLimiter, RateLimiter,
    clock::{Clock, DefaultClock},
};
use tracing::warn;

use classdesk_config::RateLimitConfig;
use classdesk_core::AppError;

use crate::state::AppState;

const AUTH_PREFIX: &str = "/api/auth/";
const API_PREFIX: &str = "/api/";

#[derive(Clone)]
pub struct RateLimiters {
    pub general: Arc<DefaultKeyedRateLimiter<String>>,
    pub auth: Arc<DefaultKeyedRateLimiter<String>>,
}

impl RateLimiters {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            general: Arc::new(RateLimiter::keyed(config.general_quota())),
            auth: Arc::new(RateLimiter::keyed(config.auth_quota())),
        }
    }

    /// Drops buckets that have fully refilled.
    pub fn retain_recent(&self) {
        self.general.retain_recent();
        self.auth.retain_recent();
    }

    fn for_path(&self, path: &str) -> Option<&DefaultKeyedRateLimiter<String>> {
        if path.starts_with(AUTH_PREFIX) {
            Some(&self.auth)
        } else if path.starts_with(API_PREFIX) {
            Some(&self.general)
        } else {
            None
        }
    }
}

/// Resolves the client address used as the limiter key.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn peer_addr(req: &Request) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Extractor for the caller's address, used in audit entries.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(client_ip(&parts.headers, peer)))
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiters.for_path(req.uri().path()) else {
        return next.run(req).await;
    };

    let key = client_ip(req.headers(), peer_addr(&req));

    match limiter.check_key(&key) {
        Ok(()) => next.run(req).await,
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after = wait.as_secs().max(1);

            warn!(client = %key, path = %req.uri().path(), retry_after, "Rate limit exceeded");

            let mut response =
                AppError::too_many_requests("Too many requests, please try again later".to_string())
                    .into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_for_takes_first_address() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let peer: SocketAddr = "192.168.1.20:5555".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "192.168.1.20");
    }

    #[test]
    fn test_unknown_without_any_source() {
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_limiter_selection_by_path() {
        let limiters = RateLimiters::from_config(&RateLimitConfig::default());

        assert!(std::ptr::eq(
            limiters.for_path("/api/auth/login").unwrap(),
            limiters.auth.as_ref()
        ));
        assert!(std::ptr::eq(
            limiters.for_path("/api/students").unwrap(),
            limiters.general.as_ref()
        ));
        assert!(limiters.for_path("/health").is_none());
        assert!(limiters.for_path("/api-docs/openapi.json").is_none());
    }

    #[test]
    fn test_auth_bucket_exhausts_after_burst() {
        let config = RateLimitConfig {
            auth_per_second: 1,
            auth_burst_size: 2,
            ..RateLimitConfig::default()
        };
        let limiters = RateLimiters::from_config(&config);
        let key = "198.51.100.1".to_string();

        assert!(limiters.auth.check_key(&key).is_ok());
        assert!(limiters.auth.check_key(&key).is_ok());
        assert!(limiters.auth.check_key(&key).is_err());
        assert!(limiters.auth.check_key(&"198.51.100.2".to_string()).is_ok());
    }
}
