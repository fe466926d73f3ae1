use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{
    admin_dashboard, child_attendance, child_fees, child_results, parent_children,
    student_attendance, student_fees, student_profile, student_results, student_timetable,
    teacher_classes, teacher_timetable,
};

pub fn init_admin_portal_router() -> Router<AppState> {
    Router::new().route("/dashboard", get(admin_dashboard))
}

pub fn init_teacher_portal_router() -> Router<AppState> {
    Router::new()
        .route("/classes", get(teacher_classes))
        .route("/timetable", get(teacher_timetable))
}

pub fn init_student_portal_router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(student_profile))
        .route("/results", get(student_results))
        .route("/attendance", get(student_attendance))
        .route("/fees", get(student_fees))
        .route("/timetable", get(student_timetable))
}

pub fn init_parent_portal_router() -> Router<AppState> {
    Router::new()
        .route("/children", get(parent_children))
        .route("/children/{student_id}/results", get(child_results))
        .route("/children/{student_id}/attendance", get(child_attendance))
        .route("/children/{student_id}/fees", get(child_fees))
}
