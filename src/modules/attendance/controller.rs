use axum::{
    Json,
    extract::{Query, State},
};
use tracing::instrument;

use classdesk_core::{AppError, Paginated, PaginationParams};
use classdesk_models::attendance::{
    AttendanceFilterParams, AttendanceSummary, AttendanceSummaryParams, AttendanceWithStudent,
    BulkAttendanceDto, BulkAttendanceResponse,
};

use crate::middleware::auth::AuthUser;
use crate::modules::attendance::service::AttendanceService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// Record a classroom's attendance for one day
///
/// Entries for the same student and date are overwritten. Every student
/// must belong to the classroom and the date may not be in the future.
#[utoipa::path(
    post,
    path = "/api/attendance/bulk",
    request_body = BulkAttendanceDto,
    responses(
        (status = 200, description = "Attendance recorded", body = BulkAttendanceResponse),
        (status = 400, description = "Future date, duplicate student or student outside the classroom"),
        (status = 404, description = "Classroom not found"),
        (status = 422, description = "Validation error")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, auth_user, dto))]
pub async fn record_bulk_attendance(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ValidatedJson(dto): ValidatedJson<BulkAttendanceDto>,
) -> Result<Json<BulkAttendanceResponse>, AppError> {
    let response = AttendanceService::record_bulk(&state.db, auth_user.user_id, dto).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceFilterParams, PaginationParams),
    responses(
        (status = 200, description = "Paginated attendance records", body = Paginated<AttendanceWithStudent>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_attendance(
    State(state): State<AppState>,
    Query(filters): Query<AttendanceFilterParams>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<Paginated<AttendanceWithStudent>>, AppError> {
    let records = AttendanceService::list(&state.db, filters, pagination).await?;
    Ok(Json(records))
}

/// Attendance counts and rate for one student
#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(AttendanceSummaryParams),
    responses(
        (status = 200, description = "Attendance summary", body = AttendanceSummary),
        (status = 404, description = "Student not found")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_attendance_summary(
    State(state): State<AppState>,
    Query(params): Query<AttendanceSummaryParams>,
) -> Result<Json<AttendanceSummary>, AppError> {
    let summary =
        AttendanceService::summary(&state.db, params.student_id, params.from, params.to).await?;
    Ok(Json(summary))
}
