use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    create_session_term, delete_term, get_current_term, get_session_terms, get_term,
    set_current_term, update_term,
};

/// Nested under `/api/sessions/{id}/terms`.
pub fn init_session_terms_router() -> Router<AppState> {
    Router::new().route("/", post(create_session_term).get(get_session_terms))
}

pub fn init_terms_router() -> Router<AppState> {
    Router::new()
        .route("/current", get(get_current_term))
        .route("/{id}", get(get_term).put(update_term).delete(delete_term))
        .route("/{id}/set-current", post(set_current_term))
}
