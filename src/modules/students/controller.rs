use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use classdesk_core::{AppError, Paginated, PaginationParams};
use classdesk_models::ids::StudentId;
use classdesk_models::students::{
    CreateStudentDto, LinkParentDto, Student, StudentFilterParams, UpdateStudentDto,
};

use crate::middleware::role::RequireAdmin;
use crate::modules::students::service::StudentService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// Enroll a student
///
/// Creates the student's login account and school record in one step. When
/// a classroom is given, its fees are billed to the new student.
#[utoipa::path(
    post,
    path = "/api/students",
    request_body = CreateStudentDto,
    responses(
        (status = 201, description = "Student created", body = Student),
        (status = 400, description = "Classroom full or parent is not a parent account"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 409, description = "Email or admission number already in use"),
        (status = 422, description = "Validation error")
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, admin, dto))]
pub async fn create_student(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ValidatedJson(dto): ValidatedJson<CreateStudentDto>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    let student = StudentService::create_student(
        &state.db,
        &state.password_policy,
        &state.fee_sync_config,
        admin.user_id,
        dto,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// List students
#[utoipa::path(
    get,
    path = "/api/students",
    params(StudentFilterParams, PaginationParams),
    responses(
        (status = 200, description = "Paginated students", body = Paginated<Student>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_students(
    State(state): State<AppState>,
    Query(filters): Query<StudentFilterParams>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<Paginated<Student>>, AppError> {
    let students = StudentService::get_students(&state.db, filters, pagination).await?;
    Ok(Json(students))
}

/// Get a student by ID
#[utoipa::path(
    get,
    path = "/api/students/{id}",
    params(("id" = StudentId, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student details", body = Student),
        (status = 404, description = "Student not found")
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<StudentId>,
) -> Result<Json<Student>, AppError> {
    let student = StudentService::get_student(&state.db, id).await?;
    Ok(Json(student))
}

/// Update a student
#[utoipa::path(
    put,
    path = "/api/students/{id}",
    params(("id" = StudentId, Path, description = "Student ID")),
    request_body = UpdateStudentDto,
    responses(
        (status = 200, description = "Student updated", body = Student),
        (status = 400, description = "Classroom full"),
        (status = 404, description = "Student not found"),
        (status = 409, description = "Admission number already in use")
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, admin, dto))]
pub async fn update_student(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<StudentId>,
    ValidatedJson(dto): ValidatedJson<UpdateStudentDto>,
) -> Result<Json<Student>, AppError> {
    let student =
        StudentService::update_student(&state.db, &state.fee_sync_config, admin.user_id, id, dto)
            .await?;
    Ok(Json(student))
}

/// Delete a student and their login account
#[utoipa::path(
    delete,
    path = "/api/students/{id}",
    params(("id" = StudentId, Path, description = "Student ID")),
    responses(
        (status = 204, description = "Student deleted"),
        (status = 404, description = "Student not found")
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin))]
pub async fn delete_student(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<StudentId>,
) -> Result<StatusCode, AppError> {
    StudentService::delete_student(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Link a parent account to a student
#[utoipa::path(
    put,
    path = "/api/students/{id}/parent",
    params(("id" = StudentId, Path, description = "Student ID")),
    request_body = LinkParentDto,
    responses(
        (status = 200, description = "Parent linked", body = Student),
        (status = 400, description = "User is not a parent"),
        (status = 404, description = "Student not found")
    ),
    tag = "Students",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin))]
pub async fn link_parent(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<StudentId>,
    ValidatedJson(dto): ValidatedJson<LinkParentDto>,
) -> Result<Json<Student>, AppError> {
    let student = StudentService::link_parent(&state.db, id, dto).await?;
    Ok(Json(student))
}
