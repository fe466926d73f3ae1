use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use classdesk_core::{AppError, Paginated, PaginationParams};
use classdesk_models::classrooms::{
    AssignSubjectDto, Classroom, ClassroomFilterParams, ClassroomSubject, ClassroomWithStats,
    CreateClassroomDto, UpdateClassroomDto,
};
use classdesk_models::ids::{ClassroomId, SubjectId};
use classdesk_models::students::Student;

use crate::middleware::role::RequireAdmin;
use crate::modules::classrooms::service::ClassroomService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// Create a classroom
#[utoipa::path(
    post,
    path = "/api/classrooms",
    request_body = CreateClassroomDto,
    responses(
        (status = 201, description = "Classroom created", body = Classroom),
        (status = 400, description = "Class teacher is not a teacher"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 409, description = "Classroom name already exists"),
        (status = 422, description = "Validation error")
    ),
    tag = "Classrooms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin, dto))]
pub async fn create_classroom(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    ValidatedJson(dto): ValidatedJson<CreateClassroomDto>,
) -> Result<(StatusCode, Json<Classroom>), AppError> {
    let classroom = ClassroomService::create_classroom(&state.db, dto).await?;
    Ok((StatusCode::CREATED, Json(classroom)))
}

/// List classrooms with enrollment counts
#[utoipa::path(
    get,
    path = "/api/classrooms",
    params(ClassroomFilterParams, PaginationParams),
    responses(
        (status = 200, description = "Paginated classrooms", body = Paginated<ClassroomWithStats>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Classrooms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_classrooms(
    State(state): State<AppState>,
    Query(filters): Query<ClassroomFilterParams>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<Paginated<ClassroomWithStats>>, AppError> {
    let classrooms = ClassroomService::get_classrooms(&state.db, filters, pagination).await?;
    Ok(Json(classrooms))
}

/// Get a classroom by ID
#[utoipa::path(
    get,
    path = "/api/classrooms/{id}",
    params(("id" = ClassroomId, Path, description = "Classroom ID")),
    responses(
        (status = 200, description = "Classroom details", body = ClassroomWithStats),
        (status = 404, description = "Classroom not found")
    ),
    tag = "Classrooms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_classroom(
    State(state): State<AppState>,
    Path(id): Path<ClassroomId>,
) -> Result<Json<ClassroomWithStats>, AppError> {
    let classroom = ClassroomService::get_classroom(&state.db, id).await?;
    Ok(Json(classroom))
}

/// Update a classroom
#[utoipa::path(
    put,
    path = "/api/classrooms/{id}",
    params(("id" = ClassroomId, Path, description = "Classroom ID")),
    request_body = UpdateClassroomDto,
    responses(
        (status = 200, description = "Classroom updated", body = Classroom),
        (status = 400, description = "Capacity below enrollment or invalid class teacher"),
        (status = 404, description = "Classroom not found"),
        (status = 409, description = "Classroom name already exists")
    ),
    tag = "Classrooms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin, dto))]
pub async fn update_classroom(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<ClassroomId>,
    ValidatedJson(dto): ValidatedJson<UpdateClassroomDto>,
) -> Result<Json<Classroom>, AppError> {
    let classroom = ClassroomService::update_classroom(&state.db, id, dto).await?;
    Ok(Json(classroom))
}

/// Delete a classroom
#[utoipa::path(
    delete,
    path = "/api/classrooms/{id}",
    params(("id" = ClassroomId, Path, description = "Classroom ID")),
    responses(
        (status = 204, description = "Classroom deleted"),
        (status = 404, description = "Classroom not found")
    ),
    tag = "Classrooms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin))]
pub async fn delete_classroom(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<ClassroomId>,
) -> Result<StatusCode, AppError> {
    ClassroomService::delete_classroom(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List the students of a classroom
#[utoipa::path(
    get,
    path = "/api/classrooms/{id}/students",
    params(("id" = ClassroomId, Path, description = "Classroom ID")),
    responses(
        (status = 200, description = "Students in the classroom", body = Vec<Student>),
        (status = 404, description = "Classroom not found")
    ),
    tag = "Classrooms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_classroom_students(
    State(state): State<AppState>,
    Path(id): Path<ClassroomId>,
) -> Result<Json<Vec<Student>>, AppError> {
    let students = ClassroomService::get_classroom_students(&state.db, id).await?;
    Ok(Json(students))
}

/// List the subjects taught in a classroom
#[utoipa::path(
    get,
    path = "/api/classrooms/{id}/subjects",
    params(("id" = ClassroomId, Path, description = "Classroom ID")),
    responses(
        (status = 200, description = "Subject assignments", body = Vec<ClassroomSubject>),
        (status = 404, description = "Classroom not found")
    ),
    tag = "Classrooms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_classroom_subjects(
    State(state): State<AppState>,
    Path(id): Path<ClassroomId>,
) -> Result<Json<Vec<ClassroomSubject>>, AppError> {
    let subjects = ClassroomService::get_subjects(&state.db, id).await?;
    Ok(Json(subjects))
}

/// Assign a subject (and optionally its teacher) to a classroom
#[utoipa::path(
    post,
    path = "/api/classrooms/{id}/subjects",
    params(("id" = ClassroomId, Path, description = "Classroom ID")),
    request_body = AssignSubjectDto,
    responses(
        (status = 201, description = "Subject assigned", body = ClassroomSubject),
        (status = 400, description = "Unknown subject or teacher"),
        (status = 404, description = "Classroom not found")
    ),
    tag = "Classrooms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin))]
pub async fn assign_subject(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<ClassroomId>,
    ValidatedJson(dto): ValidatedJson<AssignSubjectDto>,
) -> Result<(StatusCode, Json<ClassroomSubject>), AppError> {
    let assignment = ClassroomService::assign_subject(&state.db, id, dto).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Remove a subject from a classroom
#[utoipa::path(
    delete,
    path = "/api/classrooms/{id}/subjects/{subject_id}",
    params(
        ("id" = ClassroomId, Path, description = "Classroom ID"),
        ("subject_id" = SubjectId, Path, description = "Subject ID")
    ),
    responses(
        (status = 204, description = "Subject removed"),
        (status = 404, description = "Subject not assigned")
    ),
    tag = "Classrooms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin))]
pub async fn remove_subject(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path((id, subject_id)): Path<(ClassroomId, SubjectId)>,
) -> Result<StatusCode, AppError> {
    ClassroomService::remove_subject(&state.db, id, subject_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
