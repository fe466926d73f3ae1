use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    create_fee_structure, delete_fee_structure, get_fee_structure, get_fee_structures,
    get_payments, get_student_fees, record_payment, sync_all_fees, sync_classroom_fees,
    update_fee_structure, verify_fee_pin,
};

pub fn init_fees_router() -> Router<AppState> {
    Router::new()
        .route(
            "/structures",
            get(get_fee_structures).post(create_fee_structure),
        )
        .route(
            "/structures/{id}",
            get(get_fee_structure)
                .put(update_fee_structure)
                .delete(delete_fee_structure),
        )
        .route("/students/{student_id}", get(get_student_fees))
        .route(
            "/student-fees/{id}/payments",
            get(get_payments).post(record_payment),
        )
        .route("/verify/{pin}", get(verify_fee_pin))
        .route("/sync", post(sync_classroom_fees))
        .route("/sync-all", post(sync_all_fees))
}
