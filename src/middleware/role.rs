//! Role-based authorization.
//!
//! Two styles are available:
//! 1. Route-group middleware (`require_admin`, `require_staff`, ...) attached
//!    with `route_layer(middleware::from_fn_with_state(..))`
//! 2. Handler extractors (`RequireAdmin`) for the write endpoints of groups
//!    whose reads are open to more roles

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};

use classdesk_core::AppError;
use classdesk_models::users::UserRole;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Middleware that lets the request through only if the authenticated user
/// has one of `allowed_roles`.
pub async fn require_roles(
    State(state): State<AppState>,
    req: Request,
    next: Next,
    allowed_roles: &[UserRole],
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await?;
    check_any_role(&auth_user, allowed_roles)?;

    let req = Request::from_parts(parts, body);
    Ok(next.run(req).await)
}

async fn guard(state: AppState, req: Request, next: Next, allowed_roles: &[UserRole]) -> Response {
    match require_roles(State(state), req, next, allowed_roles).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// Admin only.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    guard(state, req, next, &[UserRole::Admin]).await
}

/// School staff: admins and teachers.
pub async fn require_staff(State(state): State<AppState>, req: Request, next: Next) -> Response {
    guard(state, req, next, &[UserRole::Admin, UserRole::Teacher]).await
}

pub async fn require_teacher(State(state): State<AppState>, req: Request, next: Next) -> Response {
    guard(state, req, next, &[UserRole::Teacher]).await
}

pub async fn require_parent(State(state): State<AppState>, req: Request, next: Next) -> Response {
    guard(state, req, next, &[UserRole::Parent]).await
}

pub async fn require_student(State(state): State<AppState>, req: Request, next: Next) -> Response {
    guard(state, req, next, &[UserRole::Student]).await
}

/// Any signed-in user.
pub async fn require_authenticated(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    guard(state, req, next, &UserRole::ALL).await
}

/// Extractor for admin-only handlers inside a staff route group.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_user = AuthUser::from_request_parts(parts, state).await?;

        if !auth_user.is_admin() {
            return Err(AppError::forbidden(
                "Access denied. Administrator privileges required.".to_string(),
            ));
        }

        Ok(RequireAdmin(auth_user))
    }
}

pub fn check_any_role(auth_user: &AuthUser, allowed_roles: &[UserRole]) -> Result<(), AppError> {
    if !allowed_roles.contains(&auth_user.role) {
        return Err(AppError::forbidden(format!(
            "Access denied. Required roles: {}, but user has role: {}",
            describe_roles(allowed_roles),
            auth_user.role
        )));
    }

    Ok(())
}

fn describe_roles(roles: &[UserRole]) -> String {
    roles
        .iter()
        .map(UserRole::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use classdesk_auth::{ACCESS_TOKEN_TYPE, Claims};
    use classdesk_models::ids::UserId;

    fn user_with_role(role: UserRole) -> AuthUser {
        let user_id = UserId::new();
        AuthUser {
            user_id,
            role,
            claims: Claims {
                sub: user_id.to_string(),
                email: "someone@school.test".to_string(),
                role: role.to_string(),
                jti: "jti".to_string(),
                token_type: ACCESS_TOKEN_TYPE.to_string(),
                exp: 9999999999,
                iat: 1234567890,
            },
        }
    }

    #[test]
    fn test_allowed_role_passes() {
        let teacher = user_with_role(UserRole::Teacher);
        assert!(check_any_role(&teacher, &[UserRole::Admin, UserRole::Teacher]).is_ok());
    }

    #[test]
    fn test_other_role_is_forbidden() {
        let parent = user_with_role(UserRole::Parent);
        let err = check_any_role(&parent, &[UserRole::Admin, UserRole::Teacher]).unwrap_err();

        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(
            err.message(),
            "Access denied. Required roles: admin, teacher, but user has role: parent"
        );
    }

    #[test]
    fn test_every_role_is_authenticated() {
        for role in UserRole::ALL {
            assert!(check_any_role(&user_with_role(role), &UserRole::ALL).is_ok());
        }
    }
}
