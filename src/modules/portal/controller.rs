//! Read-only views scoped to the caller.
//!
//! Student endpoints resolve the caller's own record from the token; parent
//! endpoints only serve children linked to the caller.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::instrument;

use classdesk_core::AppError;
use classdesk_models::attendance::{Attendance, AttendanceRangeParams};
use classdesk_models::fees::StudentFeeLedger;
use classdesk_models::ids::StudentId;
use classdesk_models::portal::{AdminDashboard, TeacherClass};
use classdesk_models::results::{ResultWithSubject, TermParams};
use classdesk_models::students::Student;
use classdesk_models::timetables::{TimetableEntryDetails, TimetableFilterParams};

use crate::middleware::auth::AuthUser;
use crate::modules::attendance::service::AttendanceService;
use crate::modules::fees::service::FeeService;
use crate::modules::portal::service::PortalService;
use crate::modules::results::service::ResultService;
use crate::modules::students::service::StudentService;
use crate::modules::timetables::service::TimetableService;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/portal/admin/dashboard",
    responses(
        (status = 200, description = "School-wide counts", body = AdminDashboard),
        (status = 403, description = "Forbidden - admin only")
    ),
    tag = "Portal",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn admin_dashboard(
    State(state): State<AppState>,
) -> Result<Json<AdminDashboard>, AppError> {
    let dashboard = PortalService::admin_dashboard(&state.db).await?;
    Ok(Json(dashboard))
}

#[utoipa::path(
    get,
    path = "/api/portal/teacher/classes",
    responses(
        (status = 200, description = "Classrooms the caller teaches", body = Vec<TeacherClass>),
        (status = 403, description = "Forbidden - teachers only")
    ),
    tag = "Portal",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn teacher_classes(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<TeacherClass>>, AppError> {
    let classes = PortalService::teacher_classes(&state.db, user.user_id).await?;
    Ok(Json(classes))
}

#[utoipa::path(
    get,
    path = "/api/portal/teacher/timetable",
    responses(
        (status = 200, description = "The caller's teaching periods", body = Vec<TimetableEntryDetails>),
        (status = 403, description = "Forbidden - teachers only")
    ),
    tag = "Portal",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn teacher_timetable(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<TimetableEntryDetails>>, AppError> {
    let entries = TimetableService::get_teacher_entries(&state.db, user.user_id).await?;
    Ok(Json(entries))
}

#[utoipa::path(
    get,
    path = "/api/portal/student/profile",
    responses(
        (status = 200, description = "The caller's student record", body = Student),
        (status = 404, description = "No student record for this account")
    ),
    tag = "Portal",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn student_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Student>, AppError> {
    let student = StudentService::get_student_by_user(&state.db, user.user_id).await?;
    Ok(Json(student))
}

#[utoipa::path(
    get,
    path = "/api/portal/student/results",
    params(TermParams),
    responses(
        (status = 200, description = "The caller's results", body = Vec<ResultWithSubject>)
    ),
    tag = "Portal",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn student_results(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<TermParams>,
) -> Result<Json<Vec<ResultWithSubject>>, AppError> {
    let student = StudentService::get_student_by_user(&state.db, user.user_id).await?;
    let results = ResultService::get_student_results(&state.db, student.id, params.term_id).await?;
    Ok(Json(results))
}

#[utoipa::path(
    get,
    path = "/api/portal/student/attendance",
    params(AttendanceRangeParams),
    responses(
        (status = 200, description = "The caller's attendance, newest first", body = Vec<Attendance>)
    ),
    tag = "Portal",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn student_attendance(
    State(state): State<AppState>,
    user: AuthUser,
    Query(range): Query<AttendanceRangeParams>,
) -> Result<Json<Vec<Attendance>>, AppError> {
    let student = StudentService::get_student_by_user(&state.db, user.user_id).await?;
    let records = AttendanceService::list_for_student(&state.db, student.id, &range).await?;
    Ok(Json(records))
}

#[utoipa::path(
    get,
    path = "/api/portal/student/fees",
    params(TermParams),
    responses(
        (status = 200, description = "The caller's fee ledger", body = StudentFeeLedger)
    ),
    tag = "Portal",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn student_fees(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<TermParams>,
) -> Result<Json<StudentFeeLedger>, AppError> {
    let student = StudentService::get_student_by_user(&state.db, user.user_id).await?;
    let ledger = FeeService::get_student_ledger(&state.db, student.id, params.term_id).await?;
    Ok(Json(ledger))
}

#[utoipa::path(
    get,
    path = "/api/portal/student/timetable",
    responses(
        (status = 200, description = "Timetable of the caller's classroom", body = Vec<TimetableEntryDetails>)
    ),
    tag = "Portal",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn student_timetable(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<TimetableEntryDetails>>, AppError> {
    let student = StudentService::get_student_by_user(&state.db, user.user_id).await?;
    let Some(classroom_id) = student.classroom_id else {
        return Ok(Json(Vec::new()));
    };

    let filters = TimetableFilterParams {
        classroom_id: Some(classroom_id),
        ..Default::default()
    };
    let entries = TimetableService::get_entries(&state.db, &filters).await?;
    Ok(Json(entries))
}

#[utoipa::path(
    get,
    path = "/api/portal/parent/children",
    responses(
        (status = 200, description = "Students linked to the caller", body = Vec<Student>)
    ),
    tag = "Portal",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn parent_children(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Student>>, AppError> {
    let children = StudentService::get_children(&state.db, user.user_id).await?;
    Ok(Json(children))
}

#[utoipa::path(
    get,
    path = "/api/portal/parent/children/{student_id}/results",
    params(
        ("student_id" = StudentId, Path, description = "Student ID"),
        TermParams
    ),
    responses(
        (status = 200, description = "The child's results", body = Vec<ResultWithSubject>),
        (status = 403, description = "Student is not linked to the caller")
    ),
    tag = "Portal",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn child_results(
    State(state): State<AppState>,
    user: AuthUser,
    Path(student_id): Path<StudentId>,
    Query(params): Query<TermParams>,
) -> Result<Json<Vec<ResultWithSubject>>, AppError> {
    StudentService::ensure_child_of(&state.db, user.user_id, student_id).await?;
    let results = ResultService::get_student_results(&state.db, student_id, params.term_id).await?;
    Ok(Json(results))
}

#[utoipa::path(
    get,
    path = "/api/portal/parent/children/{student_id}/attendance",
    params(
        ("student_id" = StudentId, Path, description = "Student ID"),
        AttendanceRangeParams
    ),
    responses(
        (status = 200, description = "The child's attendance", body = Vec<Attendance>),
        (status = 403, description = "Student is not linked to the caller")
    ),
    tag = "Portal",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn child_attendance(
    State(state): State<AppState>,
    user: AuthUser,
    Path(student_id): Path<StudentId>,
    Query(range): Query<AttendanceRangeParams>,
) -> Result<Json<Vec<Attendance>>, AppError> {
    StudentService::ensure_child_of(&state.db, user.user_id, student_id).await?;
    let records = AttendanceService::list_for_student(&state.db, student_id, &range).await?;
    Ok(Json(records))
}

#[utoipa::path(
    get,
    path = "/api/portal/parent/children/{student_id}/fees",
    params(
        ("student_id" = StudentId, Path, description = "Student ID"),
        TermParams
    ),
    responses(
        (status = 200, description = "The child's fee ledger", body = StudentFeeLedger),
        (status = 403, description = "Student is not linked to the caller")
    ),
    tag = "Portal",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn child_fees(
    State(state): State<AppState>,
    user: AuthUser,
    Path(student_id): Path<StudentId>,
    Query(params): Query<TermParams>,
) -> Result<Json<StudentFeeLedger>, AppError> {
    StudentService::ensure_child_of(&state.db, user.user_id, student_id).await?;
    let ledger = FeeService::get_student_ledger(&state.db, student_id, params.term_id).await?;
    Ok(Json(ledger))
}
