use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use classdesk_auth::{Claims, subject_id, verify_token};
use classdesk_core::AppError;
use classdesk_models::ids::UserId;
use classdesk_models::users::UserRole;

use crate::modules::auth::service::AuthService;
use crate::state::AppState;

/// The caller behind a validated access token.
///
/// Extraction verifies the token and then checks the session against the
/// database: the user must still exist and be active, the token must not be
/// blacklisted, and it must have been issued after the last password change.
/// The role comes from the database row, not from the token.
///
/// The first successful extraction is cached in the request extensions, so
/// a role middleware followed by an `AuthUser` handler argument costs one
/// query.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    pub role: UserRole,
    pub claims: Claims,
}

impl AuthUser {
    pub fn email(&self) -> &str {
        &self.claims.email
    }

    pub fn jti(&self) -> &str {
        &self.claims.jti
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Returns the raw bearer token, if the header is present and well formed.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Missing authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::unauthorized("Invalid authorization header format".to_string()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<AuthUser>() {
            return Ok(existing.clone());
        }

        let token = bearer_token(&parts.headers)?;
        let claims = verify_token(token, &state.jwt_config)?;
        let user_id = UserId::from(subject_id(&claims.sub)?);

        let role = AuthService::validate_session(&state.db, user_id, &claims).await?;

        let auth_user = AuthUser {
            user_id,
            role,
            claims,
        };
        parts.extensions.insert(auth_user.clone());

        Ok(auth_user)
    }
}
