use axum::{
    Router,
    routing::{get, post},
};

use crate::modules::terms::router::init_session_terms_router;
use crate::state::AppState;

use super::controller::{
    create_session, delete_session, get_current_session, get_session, get_sessions,
    set_current_session, update_session,
};

pub fn init_academic_sessions_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session).get(get_sessions))
        .route("/current", get(get_current_session))
        .route(
            "/{id}",
            get(get_session).put(update_session).delete(delete_session),
        )
        .route("/{id}/set-current", post(set_current_session))
        .nest("/{id}/terms", init_session_terms_router())
}
