use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

use super::controller::{delete_result, get_report_card, get_results, record_results};

pub fn init_results_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_results))
        .route("/bulk", post(record_results))
        .route("/report-card", get(get_report_card))
        .route("/{id}", delete(delete_result))
}
