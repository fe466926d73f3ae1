use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;
use utoipa::ToSchema;
use validator::Validate;

use classdesk_core::AppError;
use classdesk_models::auth::{
    ChangePasswordRequest, CsrfTokenResponse, LoginRequest, LoginResponse, LogoutRequest,
    MessageResponse, RefreshTokenRequest, TokenResponse,
};
use classdesk_models::users::User;

use crate::middleware::auth::AuthUser;
use crate::middleware::csrf::{csrf_cookie, generate_csrf_token};
use crate::middleware::rate_limit::ClientIp;
use crate::state::AppState;
use crate::validator::ValidatedJson;

use super::service::AuthService;

#[derive(ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Issue a CSRF token
///
/// Sets the `csrf_token` cookie. Send the same value in the `X-CSRF-Token`
/// header on every POST, PUT, PATCH and DELETE request.
#[utoipa::path(
    get,
    path = "/api/auth/csrf-token",
    responses(
        (status = 200, description = "CSRF token issued", body = CsrfTokenResponse)
    ),
    tag = "Authentication"
)]
pub async fn get_csrf_token(jar: CookieJar) -> (CookieJar, Json<CsrfTokenResponse>) {
    let csrf_token = generate_csrf_token();
    (
        jar.add(csrf_cookie(csrf_token.clone())),
        Json(CsrfTokenResponse { csrf_token }),
    )
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account deactivated", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 423, description = "Account locked", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, dto))]
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ValidatedJson(dto): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let response = AuthService::login(
        &state.db,
        &state.jwt_config,
        &state.security_config,
        dto,
        &ip,
    )
    .await?;

    Ok(Json(response))
}

/// Rotate a refresh token
///
/// The presented refresh token is revoked and a new pair is returned.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 401, description = "Invalid, expired or revoked refresh token", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, dto))]
pub async fn refresh_token(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ValidatedJson(dto): ValidatedJson<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let tokens = AuthService::refresh(&state.db, &state.jwt_config, &dto.refresh_token, &ip).await?;
    Ok(Json(tokens))
}

/// Log out
///
/// Revokes the current access token. The body is optional; when it carries
/// the caller's refresh token, that token is revoked too.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body(content = LogoutRequest, description = "Optional refresh token to revoke"),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth_user, body), fields(user_id = %auth_user.user_id))]
pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ClientIp(ip): ClientIp,
    body: Bytes,
) -> Result<Json<MessageResponse>, AppError> {
    let request = parse_logout_body(&body)?;

    AuthService::logout(
        &state.db,
        &state.jwt_config,
        auth_user.user_id,
        &auth_user.claims,
        request.refresh_token.as_deref(),
        &ip,
    )
    .await?;

    Ok(Json(MessageResponse::new("Logged out successfully")))
}

fn parse_logout_body(body: &[u8]) -> Result<LogoutRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(LogoutRequest::default());
    }

    let request: LogoutRequest = serde_json::from_slice(body)
        .map_err(|_| AppError::bad_request(anyhow::anyhow!("Invalid request body")))?;
    request.validate()?;
    Ok(request)
}

/// Get the current user's profile
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<User>, AppError> {
    let user = AuthService::get_current_user(&state.db, auth_user.user_id).await?;
    Ok(Json(user))
}

/// Change the current user's password
///
/// Tokens issued before the change stop working.
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Current password incorrect or unchanged", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 422, description = "Password policy violated", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth_user, dto), fields(user_id = %auth_user.user_id))]
pub async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ClientIp(ip): ClientIp,
    ValidatedJson(dto): ValidatedJson<ChangePasswordRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    AuthService::change_password(
        &state.db,
        &state.password_policy,
        auth_user.user_id,
        dto,
        &ip,
    )
    .await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse::new(
            "Password changed successfully. Please log in again.",
        )),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_logout_body_is_accepted() {
        assert!(parse_logout_body(b"").unwrap().refresh_token.is_none());
        assert!(parse_logout_body(b"  \n").unwrap().refresh_token.is_none());
    }

    #[test]
    fn test_logout_body_with_token() {
        let request = parse_logout_body(br#"{"refresh_token":"abc"}"#).unwrap();
        assert_eq!(request.refresh_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_malformed_logout_body_is_bad_request() {
        let err = parse_logout_body(b"{not json").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
