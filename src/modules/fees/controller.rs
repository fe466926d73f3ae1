use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use classdesk_core::{AppError, Paginated, PaginationParams};
use classdesk_models::fees::{
    CreateFeeStructureDto, FeePayment, FeeStructure, FeeStructureFilterParams, FeeSyncReport,
    FeeVerification, PaymentReceipt, RecordPaymentDto, StudentFeeLedger, SyncFeesDto,
    UpdateFeeStructureDto,
};
use classdesk_models::ids::{FeeStructureId, StudentFeeId, StudentId};
use classdesk_models::results::TermParams;

use crate::middleware::auth::AuthUser;
use crate::modules::fees::service::FeeService;
use crate::modules::fees::sync::FeeSyncService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// Create a fee structure
///
/// Active structures are billed to every active student of the classroom
/// straight away.
#[utoipa::path(
    post,
    path = "/api/fees/structures",
    request_body = CreateFeeStructureDto,
    responses(
        (status = 201, description = "Fee structure created", body = FeeStructure),
        (status = 404, description = "Classroom not found"),
        (status = 422, description = "Validation error")
    ),
    tag = "Fees",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user, dto))]
pub async fn create_fee_structure(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(dto): ValidatedJson<CreateFeeStructureDto>,
) -> Result<(StatusCode, Json<FeeStructure>), AppError> {
    let structure =
        FeeService::create_structure(&state.db, &state.fee_sync_config, user.user_id, dto).await?;
    Ok((StatusCode::CREATED, Json(structure)))
}

#[utoipa::path(
    get,
    path = "/api/fees/structures",
    params(FeeStructureFilterParams, PaginationParams),
    responses(
        (status = 200, description = "Paginated fee structures", body = Paginated<FeeStructure>)
    ),
    tag = "Fees",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_fee_structures(
    State(state): State<AppState>,
    Query(filters): Query<FeeStructureFilterParams>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<Paginated<FeeStructure>>, AppError> {
    let structures = FeeService::get_structures(&state.db, filters, pagination).await?;
    Ok(Json(structures))
}

#[utoipa::path(
    get,
    path = "/api/fees/structures/{id}",
    params(("id" = FeeStructureId, Path, description = "Fee structure ID")),
    responses(
        (status = 200, description = "Fee structure", body = FeeStructure),
        (status = 404, description = "Fee structure not found")
    ),
    tag = "Fees",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_fee_structure(
    State(state): State<AppState>,
    Path(id): Path<FeeStructureId>,
) -> Result<Json<FeeStructure>, AppError> {
    let structure = FeeService::get_structure(&state.db, id).await?;
    Ok(Json(structure))
}

/// Update a fee structure
///
/// A changed amount is carried over to billed fees; payments already made
/// are kept and each fee's status is recomputed.
#[utoipa::path(
    put,
    path = "/api/fees/structures/{id}",
    params(("id" = FeeStructureId, Path, description = "Fee structure ID")),
    request_body = UpdateFeeStructureDto,
    responses(
        (status = 200, description = "Fee structure updated", body = FeeStructure),
        (status = 404, description = "Fee structure not found"),
        (status = 422, description = "Validation error")
    ),
    tag = "Fees",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user, dto))]
pub async fn update_fee_structure(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<FeeStructureId>,
    ValidatedJson(dto): ValidatedJson<UpdateFeeStructureDto>,
) -> Result<Json<FeeStructure>, AppError> {
    let structure =
        FeeService::update_structure(&state.db, &state.fee_sync_config, user.user_id, id, dto)
            .await?;
    Ok(Json(structure))
}

#[utoipa::path(
    delete,
    path = "/api/fees/structures/{id}",
    params(("id" = FeeStructureId, Path, description = "Fee structure ID")),
    responses(
        (status = 204, description = "Fee structure deleted"),
        (status = 400, description = "Payments exist against this structure"),
        (status = 404, description = "Fee structure not found")
    ),
    tag = "Fees",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn delete_fee_structure(
    State(state): State<AppState>,
    Path(id): Path<FeeStructureId>,
) -> Result<StatusCode, AppError> {
    FeeService::delete_structure(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A student's fee ledger with totals
#[utoipa::path(
    get,
    path = "/api/fees/students/{student_id}",
    params(
        ("student_id" = StudentId, Path, description = "Student ID"),
        TermParams
    ),
    responses(
        (status = 200, description = "Fee ledger", body = StudentFeeLedger),
        (status = 404, description = "Student not found")
    ),
    tag = "Fees",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_student_fees(
    State(state): State<AppState>,
    Path(student_id): Path<StudentId>,
    Query(params): Query<TermParams>,
) -> Result<Json<StudentFeeLedger>, AppError> {
    let ledger = FeeService::get_student_ledger(&state.db, student_id, params.term_id).await?;
    Ok(Json(ledger))
}

/// Record a payment
///
/// Payments larger than the outstanding balance are rejected.
#[utoipa::path(
    post,
    path = "/api/fees/student-fees/{id}/payments",
    params(("id" = StudentFeeId, Path, description = "Student fee ID")),
    request_body = RecordPaymentDto,
    responses(
        (status = 201, description = "Payment recorded", body = PaymentReceipt),
        (status = 400, description = "Payment exceeds the outstanding balance"),
        (status = 404, description = "Student fee not found"),
        (status = 422, description = "Validation error")
    ),
    tag = "Fees",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user, dto))]
pub async fn record_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<StudentFeeId>,
    ValidatedJson(dto): ValidatedJson<RecordPaymentDto>,
) -> Result<(StatusCode, Json<PaymentReceipt>), AppError> {
    let receipt = FeeService::record_payment(&state.db, user.user_id, id, dto).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[utoipa::path(
    get,
    path = "/api/fees/student-fees/{id}/payments",
    params(("id" = StudentFeeId, Path, description = "Student fee ID")),
    responses(
        (status = 200, description = "Payments, newest first", body = Vec<FeePayment>),
        (status = 404, description = "Student fee not found")
    ),
    tag = "Fees",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_payments(
    State(state): State<AppState>,
    Path(id): Path<StudentFeeId>,
) -> Result<Json<Vec<FeePayment>>, AppError> {
    let payments = FeeService::get_payments(&state.db, id).await?;
    Ok(Json(payments))
}

/// Verify a fee by PIN
#[utoipa::path(
    get,
    path = "/api/fees/verify/{pin}",
    params(("pin" = String, Path, description = "12-digit fee PIN")),
    responses(
        (status = 200, description = "Fee found", body = FeeVerification),
        (status = 400, description = "Malformed PIN"),
        (status = 404, description = "No fee matches this PIN")
    ),
    tag = "Fees",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, pin))]
pub async fn verify_fee_pin(
    State(state): State<AppState>,
    Path(pin): Path<String>,
) -> Result<Json<FeeVerification>, AppError> {
    let verification = FeeService::verify_pin(&state.db, &pin).await?;
    Ok(Json(verification))
}

/// Sync fees for one classroom
///
/// Bills missing fees and corrects drifted amounts. Work runs in batches;
/// a failed batch is reported and the rest still apply.
#[utoipa::path(
    post,
    path = "/api/fees/sync",
    request_body = SyncFeesDto,
    responses(
        (status = 200, description = "Sync report", body = FeeSyncReport),
        (status = 404, description = "Classroom not found")
    ),
    tag = "Fees",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user, dto))]
pub async fn sync_classroom_fees(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(dto): ValidatedJson<SyncFeesDto>,
) -> Result<Json<FeeSyncReport>, AppError> {
    let report = FeeSyncService::sync_classroom(
        &state.db,
        &state.fee_sync_config,
        dto.classroom_id,
        Some(user.user_id),
    )
    .await?;
    Ok(Json(report))
}

/// Sync fees for every active classroom
#[utoipa::path(
    post,
    path = "/api/fees/sync-all",
    responses(
        (status = 200, description = "Combined sync report", body = FeeSyncReport)
    ),
    tag = "Fees",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, user))]
pub async fn sync_all_fees(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<FeeSyncReport>, AppError> {
    let report =
        FeeSyncService::sync_all(&state.db, &state.fee_sync_config, Some(user.user_id)).await?;
    Ok(Json(report))
}
