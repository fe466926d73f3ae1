use axum::{
    Router,
    routing::{get, put},
};

use crate::state::AppState;

use super::controller::{
    create_timetable_entry, delete_timetable_entry, get_timetable, update_timetable_entry,
};

pub fn init_timetables_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_timetable).post(create_timetable_entry))
        .route(
            "/{id}",
            put(update_timetable_entry).delete(delete_timetable_entry),
        )
}
