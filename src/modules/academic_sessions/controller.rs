use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use classdesk_core::{AppError, Paginated, PaginationParams};
use classdesk_models::academic_sessions::{
    AcademicSession, AcademicSessionWithStats, CreateSessionDto, UpdateSessionDto,
};
use classdesk_models::ids::SessionId;

use crate::middleware::role::RequireAdmin;
use crate::modules::academic_sessions::service::AcademicSessionService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// Create an academic session
#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body = CreateSessionDto,
    responses(
        (status = 201, description = "Session created", body = AcademicSession),
        (status = 403, description = "Forbidden - admin only"),
        (status = 409, description = "Session name already exists"),
        (status = 422, description = "Validation error")
    ),
    tag = "Academic Sessions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin, dto))]
pub async fn create_session(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    ValidatedJson(dto): ValidatedJson<CreateSessionDto>,
) -> Result<(StatusCode, Json<AcademicSession>), AppError> {
    let session = AcademicSessionService::create_session(&state.db, dto).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// List academic sessions, newest first
#[utoipa::path(
    get,
    path = "/api/sessions",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated sessions", body = Paginated<AcademicSessionWithStats>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Academic Sessions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_sessions(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<Paginated<AcademicSessionWithStats>>, AppError> {
    let sessions = AcademicSessionService::get_sessions(&state.db, pagination).await?;
    Ok(Json(sessions))
}

/// Get the current academic session
#[utoipa::path(
    get,
    path = "/api/sessions/current",
    responses(
        (status = 200, description = "Current session", body = AcademicSession),
        (status = 404, description = "No session is current")
    ),
    tag = "Academic Sessions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_current_session(
    State(state): State<AppState>,
) -> Result<Json<AcademicSession>, AppError> {
    let session = AcademicSessionService::get_current(&state.db).await?;
    Ok(Json(session))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(("id" = SessionId, Path, description = "Academic session ID")),
    responses(
        (status = 200, description = "Session details", body = AcademicSessionWithStats),
        (status = 404, description = "Session not found")
    ),
    tag = "Academic Sessions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<AcademicSessionWithStats>, AppError> {
    let session = AcademicSessionService::get_session(&state.db, id).await?;
    Ok(Json(session))
}

/// Update an academic session
#[utoipa::path(
    put,
    path = "/api/sessions/{id}",
    params(("id" = SessionId, Path, description = "Academic session ID")),
    request_body = UpdateSessionDto,
    responses(
        (status = 200, description = "Session updated", body = AcademicSession),
        (status = 400, description = "Dates out of order or would strand existing terms"),
        (status = 404, description = "Session not found")
    ),
    tag = "Academic Sessions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin, dto))]
pub async fn update_session(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<SessionId>,
    ValidatedJson(dto): ValidatedJson<UpdateSessionDto>,
) -> Result<Json<AcademicSession>, AppError> {
    let session = AcademicSessionService::update_session(&state.db, id, dto).await?;
    Ok(Json(session))
}

#[utoipa::path(
    delete,
    path = "/api/sessions/{id}",
    params(("id" = SessionId, Path, description = "Academic session ID")),
    responses(
        (status = 204, description = "Session and its terms deleted"),
        (status = 400, description = "Session is current"),
        (status = 404, description = "Session not found")
    ),
    tag = "Academic Sessions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin))]
pub async fn delete_session(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<SessionId>,
) -> Result<StatusCode, AppError> {
    AcademicSessionService::delete_session(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Make a session the current one
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/set-current",
    params(("id" = SessionId, Path, description = "Academic session ID")),
    responses(
        (status = 200, description = "Session is now current", body = AcademicSession),
        (status = 404, description = "Session not found")
    ),
    tag = "Academic Sessions",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin))]
pub async fn set_current_session(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<SessionId>,
) -> Result<Json<AcademicSession>, AppError> {
    let session = AcademicSessionService::set_current(&state.db, id).await?;
    Ok(Json(session))
}
