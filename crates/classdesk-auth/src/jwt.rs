//! Token creation and verification.
//!
//! Access tokens are short-lived and carry the user's role. Refresh tokens
//! are long-lived and are rotated on every use: the caller blacklists the
//! presented `jti` and asks for a fresh pair.
//!
//! # Example
//!
//! ```ignore
//! use classdesk_auth::{create_token_pair, verify_token};
//! use classdesk_config::JwtConfig;
//!
//! let config = JwtConfig::from_env();
//! let pair = create_token_pair(user_id, "user@example.com", "teacher", &config)?;
//! let claims = verify_token(&pair.access_token, &config)?;
//! ```

use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use classdesk_config::JwtConfig;
use classdesk_core::AppError;

use crate::claims::{ACCESS_TOKEN_TYPE, Claims, REFRESH_TOKEN_TYPE, RefreshTokenClaims};

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

pub fn create_access_token(
    user_id: Uuid,
    email: &str,
    role: &str,
    jwt_config: &JwtConfig,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp() as usize;
    let exp = now + jwt_config.access_token_expiry as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        jti: Uuid::new_v4().to_string(),
        token_type: ACCESS_TOKEN_TYPE.to_string(),
        exp,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_config.secret.as_bytes()),
    )
    .map_err(|e| AppError::internal_error(format!("Failed to create token: {}", e)))
}

/// Verifies an access token's signature, expiry and type.
///
/// Blacklist and password-change checks need the database and are done by
/// the session layer in the API crate.
pub fn verify_token(token: &str, jwt_config: &JwtConfig) -> Result<Claims, AppError> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::unauthorized("Invalid or expired token".to_string()))?;

    if claims.token_type != ACCESS_TOKEN_TYPE {
        return Err(AppError::unauthorized("Invalid token type".to_string()));
    }

    Ok(claims)
}

pub fn create_refresh_token(user_id: Uuid, jwt_config: &JwtConfig) -> Result<String, AppError> {
    let now = Utc::now().timestamp() as usize;
    let exp = now + jwt_config.refresh_token_expiry as usize;

    let claims = RefreshTokenClaims {
        sub: user_id.to_string(),
        jti: Uuid::new_v4().to_string(),
        token_type: REFRESH_TOKEN_TYPE.to_string(),
        exp,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_config.secret.as_bytes()),
    )
    .map_err(|e| AppError::internal_error(format!("Failed to create refresh token: {}", e)))
}

pub fn verify_refresh_token(
    token: &str,
    jwt_config: &JwtConfig,
) -> Result<RefreshTokenClaims, AppError> {
    let claims = decode::<RefreshTokenClaims>(
        token,
        &DecodingKey::from_secret(jwt_config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::unauthorized("Invalid or expired refresh token".to_string()))?;

    if claims.token_type != REFRESH_TOKEN_TYPE {
        return Err(AppError::unauthorized("Invalid token type".to_string()));
    }

    Ok(claims)
}

pub fn create_token_pair(
    user_id: Uuid,
    email: &str,
    role: &str,
    jwt_config: &JwtConfig,
) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access_token: create_access_token(user_id, email, role, jwt_config)?,
        refresh_token: create_refresh_token(user_id, jwt_config)?,
        expires_in: jwt_config.access_token_expiry,
    })
}

/// Converts a JWT `exp`/`iat` claim to a timestamp.
#[must_use]
pub fn timestamp_to_datetime(ts: usize) -> DateTime<Utc> {
    DateTime::from_timestamp(ts as i64, 0).unwrap_or_else(Utc::now)
}

/// Parses the `sub` claim.
pub fn subject_id(sub: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(sub).map_err(|_| AppError::unauthorized("Invalid token subject".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_jwt_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
        }
    }

    #[test]
    fn test_verify_token_success() {
        let config = get_test_jwt_config();
        let user_id = Uuid::new_v4();

        let token = create_access_token(user_id, "test@example.com", "admin", &config).unwrap();
        let claims = verify_token(&token, &config).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.role, "admin");
        assert!(Uuid::parse_str(&claims.jti).is_ok());
    }

    #[test]
    fn test_verify_token_invalid() {
        let config = get_test_jwt_config();
        assert!(verify_token("invalid-token", &config).is_err());
    }

    #[test]
    fn test_verify_token_wrong_secret() {
        let config = get_test_jwt_config();
        let token = create_access_token(Uuid::new_v4(), "a@b.com", "admin", &config).unwrap();

        let wrong_config = JwtConfig {
            secret: "different-secret-key-at-least-32-characters".to_string(),
            ..get_test_jwt_config()
        };

        assert!(verify_token(&token, &wrong_config).is_err());
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let config = get_test_jwt_config();
        let refresh = create_refresh_token(Uuid::new_v4(), &config).unwrap();
        assert!(verify_token(&refresh, &config).is_err());
        assert!(verify_refresh_token(&refresh, &config).is_ok());
    }

    #[test]
    fn test_access_token_is_not_a_refresh_token() {
        let config = get_test_jwt_config();
        let access = create_access_token(Uuid::new_v4(), "a@b.com", "parent", &config).unwrap();
        assert!(verify_refresh_token(&access, &config).is_err());
    }

    #[test]
    fn test_each_token_gets_a_unique_jti() {
        let config = get_test_jwt_config();
        let user_id = Uuid::new_v4();
        let first = verify_refresh_token(&create_refresh_token(user_id, &config).unwrap(), &config)
            .unwrap();
        let second =
            verify_refresh_token(&create_refresh_token(user_id, &config).unwrap(), &config)
                .unwrap();
        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn test_token_pair_expiry() {
        let config = get_test_jwt_config();
        let pair = create_token_pair(Uuid::new_v4(), "a@b.com", "student", &config).unwrap();
        assert_eq!(pair.expires_in, 900);

        let access = verify_token(&pair.access_token, &config).unwrap();
        let refresh = verify_refresh_token(&pair.refresh_token, &config).unwrap();
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn test_subject_id() {
        let id = Uuid::new_v4();
        assert_eq!(subject_id(&id.to_string()).unwrap(), id);
        assert!(subject_id("nope").is_err());
    }

    #[test]
    fn test_timestamp_to_datetime() {
        assert_eq!(timestamp_to_datetime(0).timestamp(), 0);
    }
}
