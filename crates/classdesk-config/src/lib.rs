//! # Classdesk Config
//!
//! Configuration types for the Classdesk API.
//!
//! This crate provides configuration structures loaded from environment variables:
//!
//! - [`jwt`]: JWT authentication configuration
//! - [`cors`]: CORS (Cross-Origin Resource Sharing) configuration
//! - [`rate_limit`]: API rate limiting configuration
//! - [`security`]: Account lockout and CSRF settings
//! - [`fee_sync`]: Fee synchronization batch settings
//!
//! # Example
//!
//! ```ignore
//! use classdesk_config::{CorsConfig, JwtConfig, RateLimitConfig, SecurityConfig};
//!
//! let jwt_config = JwtConfig::from_env();
//! let cors_config = CorsConfig::from_env();
//! let rate_limit_config = RateLimitConfig::from_env();
//! let security_config = SecurityConfig::from_env();
//! ```

pub mod cors;
pub mod fee_sync;
pub mod jwt;
pub mod rate_limit;
pub mod security;

pub use cors::CorsConfig;
pub use fee_sync::FeeSyncConfig;
pub use jwt::JwtConfig;
pub use rate_limit::RateLimitConfig;
pub use security::SecurityConfig;
