use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use classdesk_core::AppError;
use classdesk_models::ids::{SessionId, TermId};
use classdesk_models::terms::{CreateTermDto, Term, UpdateTermDto};

use crate::middleware::role::RequireAdmin;
use crate::modules::terms::service::TermService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// Create a term within an academic session
///
/// Dates must lie inside the session and must not overlap other terms of
/// the session. The sequence defaults to the next free position.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/terms",
    params(("id" = SessionId, Path, description = "Academic session ID")),
    request_body = CreateTermDto,
    responses(
        (status = 201, description = "Term created", body = Term),
        (status = 400, description = "Dates outside the session or overlapping another term"),
        (status = 404, description = "Academic session not found"),
        (status = 409, description = "Term name or sequence already used in this session")
    ),
    tag = "Terms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin, dto))]
pub async fn create_session_term(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(session_id): Path<SessionId>,
    ValidatedJson(dto): ValidatedJson<CreateTermDto>,
) -> Result<(StatusCode, Json<Term>), AppError> {
    let term = TermService::create_term(&state.db, session_id, dto).await?;
    Ok((StatusCode::CREATED, Json(term)))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}/terms",
    params(("id" = SessionId, Path, description = "Academic session ID")),
    responses(
        (status = 200, description = "Terms ordered by sequence", body = Vec<Term>),
        (status = 404, description = "Academic session not found")
    ),
    tag = "Terms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_session_terms(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Vec<Term>>, AppError> {
    let terms = TermService::get_session_terms(&state.db, session_id).await?;
    Ok(Json(terms))
}

#[utoipa::path(
    get,
    path = "/api/terms/current",
    responses(
        (status = 200, description = "Current term", body = Term),
        (status = 404, description = "No term is current")
    ),
    tag = "Terms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_current_term(State(state): State<AppState>) -> Result<Json<Term>, AppError> {
    let term = TermService::get_current_term(&state.db).await?;
    Ok(Json(term))
}

#[utoipa::path(
    get,
    path = "/api/terms/{id}",
    params(("id" = TermId, Path, description = "Term ID")),
    responses(
        (status = 200, description = "Term details", body = Term),
        (status = 404, description = "Term not found")
    ),
    tag = "Terms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_term(
    State(state): State<AppState>,
    Path(id): Path<TermId>,
) -> Result<Json<Term>, AppError> {
    let term = TermService::get_term(&state.db, id).await?;
    Ok(Json(term))
}

#[utoipa::path(
    put,
    path = "/api/terms/{id}",
    params(("id" = TermId, Path, description = "Term ID")),
    request_body = UpdateTermDto,
    responses(
        (status = 200, description = "Term updated", body = Term),
        (status = 400, description = "Invalid dates"),
        (status = 404, description = "Term not found"),
        (status = 409, description = "Term name or sequence already used in this session")
    ),
    tag = "Terms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin, dto))]
pub async fn update_term(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<TermId>,
    ValidatedJson(dto): ValidatedJson<UpdateTermDto>,
) -> Result<Json<Term>, AppError> {
    let term = TermService::update_term(&state.db, id, dto).await?;
    Ok(Json(term))
}

#[utoipa::path(
    delete,
    path = "/api/terms/{id}",
    params(("id" = TermId, Path, description = "Term ID")),
    responses(
        (status = 204, description = "Term deleted"),
        (status = 404, description = "Term not found")
    ),
    tag = "Terms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin))]
pub async fn delete_term(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<TermId>,
) -> Result<StatusCode, AppError> {
    TermService::delete_term(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Make a term the current one
#[utoipa::path(
    post,
    path = "/api/terms/{id}/set-current",
    params(("id" = TermId, Path, description = "Term ID")),
    responses(
        (status = 200, description = "Term is now current", body = Term),
        (status = 400, description = "The term's session is not current"),
        (status = 404, description = "Term not found")
    ),
    tag = "Terms",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin))]
pub async fn set_current_term(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<TermId>,
) -> Result<Json<Term>, AppError> {
    let term = TermService::set_current_term(&state.db, id).await?;
    Ok(Json(term))
}
