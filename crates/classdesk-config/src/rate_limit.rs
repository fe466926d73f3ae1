//! Rate limiting configuration for API endpoints.
//!
//! This module provides configuration for rate limiting using the `governor` crate.
//! Rate limits help protect the API from abuse and ensure fair usage.
//!
//! # Configuration
//!
//! Rate limits can be configured via environment variables:
//!
//! - `RATE_LIMIT_GENERAL_PER_SECOND`: Requests per second for general endpoints (default: 20)
//! - `RATE_LIMIT_GENERAL_BURST_SIZE`: Burst size for general endpoints (default: 60)
//! - `RATE_LIMIT_AUTH_PER_SECOND`: Requests per second for auth endpoints (default: 1)
//! - `RATE_LIMIT_AUTH_BURST_SIZE`: Burst size for auth endpoints (default: 10)
//!
//! # Rate Limiting Strategy
//!
//! The rate limiter uses a token bucket algorithm:
//!
//! - Tokens are added at the configured rate (per second)
//! - Each request consumes one token
//! - Burst size defines the maximum tokens that can accumulate
//! - Requests are rejected when no tokens are available
//!
//! # Example
//!
//! ```ignore
//! use classdesk_config::RateLimitConfig;
//!
//! let config = RateLimitConfig::from_env();
//! let limiter = governor::RateLimiter::keyed(config.auth_quota());
//! ```

use governor::Quota;
use std::num::NonZeroU32;

/// Rate limit configuration for the API.
///
/// Defines separate rate limits for general API endpoints and authentication
/// endpoints (which typically need stricter limits to prevent brute-force attacks).
///
/// # Fields
///
/// - `general_per_second`: Token replenishment rate for general endpoints
/// - `general_burst_size`: Maximum token accumulation for general endpoints
/// - `auth_per_second`: Token replenishment rate for auth endpoints
/// - `auth_burst_size`: Maximum token accumulation for auth endpoints
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests per second for general endpoints.
    ///
    /// This is the rate at which tokens are replenished in the bucket.
    pub general_per_second: u32,

    /// Burst size for general endpoints.
    ///
    /// This is the maximum number of tokens that can accumulate,
    /// allowing short bursts of traffic above the per-second rate.
    pub general_burst_size: u32,

    /// Requests per second for auth endpoints (stricter).
    ///
    /// Auth endpoints have stricter limits to prevent brute-force attacks
    /// on login and password reset endpoints.
    pub auth_per_second: u32,

    /// Burst size for auth endpoints (stricter).
    ///
    /// Lower burst size for auth endpoints provides additional protection
    /// against rapid-fire authentication attempts.
    pub auth_burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_per_second: 20,
            general_burst_size: 60,
            auth_per_second: 1,
            auth_burst_size: 10,
        }
    }
}

impl RateLimitConfig {
    /// Creates a new `RateLimitConfig` from environment variables.
    ///
    /// Falls back to default values if environment variables are not set
    /// or cannot be parsed.
    ///
    /// # Environment Variables
    ///
    /// - `RATE_LIMIT_GENERAL_PER_SECOND`: Default 20
    /// - `RATE_LIMIT_GENERAL_BURST_SIZE`: Default 60
    /// - `RATE_LIMIT_AUTH_PER_SECOND`: Default 1
    /// - `RATE_LIMIT_AUTH_BURST_SIZE`: Default 10
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            general_per_second: read_env("RATE_LIMIT_GENERAL_PER_SECOND")
                .unwrap_or(defaults.general_per_second),
            general_burst_size: read_env("RATE_LIMIT_GENERAL_BURST_SIZE")
                .unwrap_or(defaults.general_burst_size),
            auth_per_second: read_env("RATE_LIMIT_AUTH_PER_SECOND")
                .unwrap_or(defaults.auth_per_second),
            auth_burst_size: read_env("RATE_LIMIT_AUTH_BURST_SIZE")
                .unwrap_or(defaults.auth_burst_size),
        }
    }

    /// Quota for general API endpoints.
    ///
    /// Zero values are raised to one so a misconfigured environment cannot
    /// block every request.
    #[must_use]
    pub fn general_quota(&self) -> Quota {
        build_quota(self.general_per_second, self.general_burst_size)
    }

    /// Quota for authentication endpoints (login, refresh).
    #[must_use]
    pub fn auth_quota(&self) -> Quota {
        build_quota(self.auth_per_second, self.auth_burst_size)
    }
}

fn read_env(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn build_quota(per_second: u32, burst: u32) -> Quota {
    let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::per_second(rate).allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.general_per_second, 20);
        assert_eq!(config.general_burst_size, 60);
        assert_eq!(config.auth_per_second, 1);
        assert_eq!(config.auth_burst_size, 10);
    }

    #[test]
    fn test_quota_burst_matches_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.auth_quota().burst_size().get(), 10);
        assert_eq!(config.general_quota().burst_size().get(), 60);
    }

    #[test]
    fn test_zero_values_are_raised() {
        let config = RateLimitConfig {
            general_per_second: 0,
            general_burst_size: 0,
            auth_per_second: 0,
            auth_burst_size: 0,
        };
        assert_eq!(config.auth_quota().burst_size().get(), 1);
    }

    #[test]
    fn test_config_equality() {
        let config1 = RateLimitConfig::default();
        let config2 = RateLimitConfig::default();
        assert_eq!(config1, config2);
    }

    #[test]
    fn test_config_debug() {
        let config = RateLimitConfig::default();
        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("RateLimitConfig"));
        assert!(debug_str.contains("general_per_second"));
    }
}
