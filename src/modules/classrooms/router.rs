use axum::{
    Router,
    routing::{delete, get},
};

use crate::state::AppState;

use super::controller::{
    assign_subject, create_classroom, delete_classroom, get_classroom, get_classroom_students,
    get_classroom_subjects, get_classrooms, remove_subject, update_classroom,
};

pub fn init_classrooms_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_classrooms).post(create_classroom))
        .route(
            "/{id}",
            get(get_classroom)
                .put(update_classroom)
                .delete(delete_classroom),
        )
        .route("/{id}/students", get(get_classroom_students))
        .route(
            "/{id}/subjects",
            get(get_classroom_subjects).post(assign_subject),
        )
        .route("/{id}/subjects/{subject_id}", delete(remove_subject))
}
