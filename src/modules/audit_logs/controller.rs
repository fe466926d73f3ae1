use axum::{
    Json,
    extract::{Query, State},
};
use tracing::instrument;

use classdesk_core::{AppError, Paginated, PaginationParams};
use classdesk_models::audit::{AuditLog, AuditLogFilterParams};

use crate::modules::audit_logs::service::AuditService;
use crate::state::AppState;

/// List audit log entries, newest first
#[utoipa::path(
    get,
    path = "/api/audit-logs",
    params(AuditLogFilterParams, PaginationParams),
    responses(
        (status = 200, description = "Audit log entries", body = Paginated<AuditLog>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only")
    ),
    tag = "Audit Logs",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_audit_logs(
    State(state): State<AppState>,
    Query(filters): Query<AuditLogFilterParams>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Json<Paginated<AuditLog>>, AppError> {
    let logs = AuditService::list(&state.db, filters, pagination).await?;
    Ok(Json(logs))
}
