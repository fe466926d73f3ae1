//! JWT claim structures for authentication tokens.
//!
//! - [`Claims`]: access token claims carrying the user's role
//! - [`RefreshTokenClaims`]: refresh token claims used for rotation
//!
//! Both carry a `jti` so that individual tokens can be blacklisted on
//! logout and rotation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const ACCESS_TOKEN_TYPE: &str = "access";
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// JWT claims for access tokens.
///
/// `role` is the lowercase role name (`admin`, `teacher`, `parent`,
/// `student`). It is parsed by the role middleware, not trusted blindly:
/// the session check re-reads the user on every request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    /// User ID (subject claim)
    pub sub: String,
    pub email: String,
    pub role: String,
    /// Unique token identifier, used for blacklisting
    pub jti: String,
    pub token_type: String,
    /// Expiration (Unix timestamp)
    pub exp: usize,
    /// Issued-at (Unix timestamp)
    pub iat: usize,
}

/// JWT claims for refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub jti: String,
    pub token_type: String,
    pub exp: usize,
    pub iat: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_serialize() {
        let claims = Claims {
            sub: "user-id-123".to_string(),
            email: "test@example.com".to_string(),
            role: "teacher".to_string(),
            jti: "jti-1".to_string(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            exp: 1234567890,
            iat: 1234567800,
        };
        let serialized = serde_json::to_string(&claims).unwrap();
        assert!(serialized.contains(r#""sub":"user-id-123""#));
        assert!(serialized.contains(r#""role":"teacher""#));
        assert!(serialized.contains(r#""token_type":"access""#));
    }

    #[test]
    fn test_refresh_claims_do_not_parse_as_access_claims() {
        let json = r#"{"sub":"u","jti":"j","token_type":"refresh","exp":9999999999,"iat":1}"#;
        assert!(serde_json::from_str::<Claims>(json).is_err());
        let claims: RefreshTokenClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.token_type, REFRESH_TOKEN_TYPE);
    }
}
