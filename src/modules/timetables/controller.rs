use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use classdesk_core::AppError;
use classdesk_models::ids::TimetableEntryId;
use classdesk_models::timetables::{
    CreateTimetableEntryDto, TimetableEntry, TimetableEntryDetails, TimetableFilterParams,
    UpdateTimetableEntryDto,
};

use crate::middleware::role::RequireAdmin;
use crate::modules::timetables::service::TimetableService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// Add a timetable entry
///
/// Rejected with 409 when it overlaps another entry of the same classroom
/// or of the same teacher on that day.
#[utoipa::path(
    post,
    path = "/api/timetables",
    request_body = CreateTimetableEntryDto,
    responses(
        (status = 201, description = "Entry created", body = TimetableEntry),
        (status = 400, description = "Teacher is not a teacher account"),
        (status = 404, description = "Classroom not found"),
        (status = 409, description = "Clashes with an existing entry"),
        (status = 422, description = "Validation error")
    ),
    tag = "Timetables",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin, dto))]
pub async fn create_timetable_entry(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    ValidatedJson(dto): ValidatedJson<CreateTimetableEntryDto>,
) -> Result<(StatusCode, Json<TimetableEntry>), AppError> {
    let entry = TimetableService::create_entry(&state.db, dto).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[utoipa::path(
    get,
    path = "/api/timetables",
    params(TimetableFilterParams),
    responses(
        (status = 200, description = "Timetable entries by day and start time", body = Vec<TimetableEntryDetails>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Timetables",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_timetable(
    State(state): State<AppState>,
    Query(filters): Query<TimetableFilterParams>,
) -> Result<Json<Vec<TimetableEntryDetails>>, AppError> {
    let entries = TimetableService::get_entries(&state.db, &filters).await?;
    Ok(Json(entries))
}

#[utoipa::path(
    put,
    path = "/api/timetables/{id}",
    params(("id" = TimetableEntryId, Path, description = "Timetable entry ID")),
    request_body = UpdateTimetableEntryDto,
    responses(
        (status = 200, description = "Entry updated", body = TimetableEntry),
        (status = 400, description = "Times out of order"),
        (status = 404, description = "Entry not found"),
        (status = 409, description = "Clashes with an existing entry")
    ),
    tag = "Timetables",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin, dto))]
pub async fn update_timetable_entry(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<TimetableEntryId>,
    ValidatedJson(dto): ValidatedJson<UpdateTimetableEntryDto>,
) -> Result<Json<TimetableEntry>, AppError> {
    let entry = TimetableService::update_entry(&state.db, id, dto).await?;
    Ok(Json(entry))
}

#[utoipa::path(
    delete,
    path = "/api/timetables/{id}",
    params(("id" = TimetableEntryId, Path, description = "Timetable entry ID")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 404, description = "Entry not found")
    ),
    tag = "Timetables",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, _admin))]
pub async fn delete_timetable_entry(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<TimetableEntryId>,
) -> Result<StatusCode, AppError> {
    TimetableService::delete_entry(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
