use sqlx::PgPool;

use classdesk_config::{CorsConfig, FeeSyncConfig, JwtConfig, RateLimitConfig, SecurityConfig};
use classdesk_core::PasswordPolicy;

use crate::middleware::rate_limit::RateLimiters;

/// State shared by every request handler.
///
/// Everything here is cheap to clone: the pool and the limiters are
/// reference counted, the rest is immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub jwt_config: JwtConfig,
    pub cors_config: CorsConfig,
    pub rate_limit_config: RateLimitConfig,
    pub security_config: SecurityConfig,
    pub fee_sync_config: FeeSyncConfig,
    pub password_policy: PasswordPolicy,
    pub rate_limiters: RateLimiters,
}

impl AppState {
    /// Builds the state from environment variables around an existing pool.
    pub fn from_env(db: PgPool) -> Self {
        let rate_limit_config = RateLimitConfig::from_env();
        let rate_limiters = RateLimiters::from_config(&rate_limit_config);

        Self {
            db,
            jwt_config: JwtConfig::from_env(),
            cors_config: CorsConfig::from_env(),
            rate_limit_config,
            security_config: SecurityConfig::from_env(),
            fee_sync_config: FeeSyncConfig::from_env(),
            password_policy: PasswordPolicy::default(),
            rate_limiters,
        }
    }
}
