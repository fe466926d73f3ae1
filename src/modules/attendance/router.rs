use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{get_attendance, get_attendance_summary, record_bulk_attendance};

pub fn init_attendance_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_attendance))
        .route("/bulk", post(record_bulk_attendance))
        .route("/summary", get(get_attendance_summary))
}
