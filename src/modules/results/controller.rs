use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use classdesk_core::AppError;
use classdesk_models::ids::ResultId;
use classdesk_models::results::{
    BulkResultsDto, BulkResultsResponse, ReportCard, ReportCardParams, ResultFilterParams,
    ResultWithSubject,
};

use crate::middleware::auth::AuthUser;
use crate::middleware::role::RequireAdmin;
use crate::modules::results::service::ResultService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// Record results for a subject
///
/// Each entry's total and grade are computed from its CA and exam scores.
/// Submitting again for the same student, subject and term overwrites.
#[utoipa::path(
    post,
    path = "/api/results/bulk",
    request_body = BulkResultsDto,
    responses(
        (status = 200, description = "Results recorded", body = BulkResultsResponse),
        (status = 400, description = "Subject not offered or students outside the classroom"),
        (status = 404, description = "Classroom not found"),
        (status = 422, description = "Scores out of range")
    ),
    tag = "Results",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user, dto))]
pub async fn record_results(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(dto): ValidatedJson<BulkResultsDto>,
) -> Result<Json<BulkResultsResponse>, AppError> {
    let response = ResultService::record_bulk(&state.db, user.user_id, dto).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/results",
    params(ResultFilterParams),
    responses(
        (status = 200, description = "Matching results", body = Vec<ResultWithSubject>)
    ),
    tag = "Results",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_results(
    State(state): State<AppState>,
    Query(filters): Query<ResultFilterParams>,
) -> Result<Json<Vec<ResultWithSubject>>, AppError> {
    let results = ResultService::list(&state.db, &filters).await?;
    Ok(Json(results))
}

/// Term report card
///
/// Position uses competition ranking by average within the classroom, so
/// tied students share a place.
#[utoipa::path(
    get,
    path = "/api/results/report-card",
    params(ReportCardParams),
    responses(
        (status = 200, description = "Report card", body = ReportCard),
        (status = 404, description = "Student or term not found")
    ),
    tag = "Results",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_report_card(
    State(state): State<AppState>,
    Query(params): Query<ReportCardParams>,
) -> Result<Json<ReportCard>, AppError> {
    let card = ResultService::report_card(&state.db, params.student_id, params.term_id).await?;
    Ok(Json(card))
}

#[utoipa::path(
    delete,
    path = "/api/results/{id}",
    params(("id" = ResultId, Path, description = "Result ID")),
    responses(
        (status = 204, description = "Result deleted"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Result not found")
    ),
    tag = "Results",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin))]
pub async fn delete_result(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<ResultId>,
) -> Result<StatusCode, AppError> {
    ResultService::delete_result(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
