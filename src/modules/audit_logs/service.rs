use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{instrument, warn};

use classdesk_core::{AppError, Paginated, PaginationParams};
use classdesk_models::audit::{AuditLog, AuditLogFilterParams, NewAuditLog};

pub struct AuditService;

impl AuditService {
    #[instrument(skip(db, entry), fields(action = %entry.action))]
    pub async fn record(db: &PgPool, entry: NewAuditLog) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO audit_logs
                (actor_id, action, entity_type, entity_id, method, path, status_code,
                 ip_address, user_agent, details)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(entry.actor_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.method)
        .bind(&entry.path)
        .bind(entry.status_code)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.details)
        .execute(db)
        .await?;

        Ok(())
    }

    /// Writes the entry on a background task. Failures are logged and never
    /// reach the caller.
    pub fn spawn_record(db: &PgPool, entry: NewAuditLog) {
        let db = db.clone();
        tokio::spawn(async move {
            let action = entry.action.clone();
            if let Err(err) = Self::record(&db, entry).await {
                warn!(action = %action, error = %err, "Failed to write audit log");
            }
        });
    }

    #[instrument(skip(db))]
    pub async fn list(
        db: &PgPool,
        filters: AuditLogFilterParams,
        pagination: PaginationParams,
    ) -> Result<Paginated<AuditLog>, AppError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_logs");
        push_filters(&mut count_query, &filters);
        let total: i64 = count_query.build_query_scalar::<i64>().fetch_one(db).await?;

        let mut data_query = QueryBuilder::<Postgres>::new(
            r#"SELECT id, actor_id, action, entity_type, entity_id, method, path, status_code,
                      ip_address, user_agent, details, created_at
               FROM audit_logs"#,
        );
        push_filters(&mut data_query, &filters);
        data_query.push(" ORDER BY created_at DESC LIMIT ");
        data_query.push_bind(pagination.limit());
        data_query.push(" OFFSET ");
        data_query.push_bind(pagination.offset());

        let logs = data_query
            .build_query_as::<AuditLog>()
            .fetch_all(db)
            .await?;

        Ok(Paginated::new(logs, total, &pagination))
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &AuditLogFilterParams) {
    builder.push(" WHERE 1=1");

    if let Some(actor_id) = filters.actor_id {
        builder.push(" AND actor_id = ");
        builder.push_bind(actor_id);
    }
    if let Some(action) = &filters.action {
        builder.push(" AND action = ");
        builder.push_bind(action.clone());
    }
    if let Some(entity_type) = &filters.entity_type {
        builder.push(" AND entity_type = ");
        builder.push_bind(entity_type.clone());
    }
    if let Some(from) = filters.from {
        builder.push(" AND created_at >= ");
        builder.push_bind(from);
    }
    if let Some(to) = filters.to {
        builder.push(" AND created_at <= ");
        builder.push_bind(to);
    }
}
