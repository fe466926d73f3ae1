use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{change_password, get_csrf_token, get_me, login, logout, refresh_token};

/// Login, refresh and the CSRF token endpoint are public; the rest resolve
/// the caller through the `AuthUser` extractor.
pub fn init_auth_router() -> Router<AppState> {
    Router::new()
        .route("/csrf-token", get(get_csrf_token))
        .route("/login", post(login))
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
        .route("/me", get(get_me))
        .route("/change-password", post(change_password))
}
