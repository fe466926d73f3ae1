use anyhow::anyhow;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument};

use classdesk_core::{AppError, Paginated, PaginationParams};
use classdesk_models::ids::SubjectId;
use classdesk_models::subjects::{
    CreateSubjectDto, Subject, SubjectFilterParams, UpdateSubjectDto, normalize_subject_code,
};

const SUBJECT_COLUMNS: &str = "id, name, code, description, is_active, created_at, updated_at";

pub struct SubjectService;

impl SubjectService {
    #[instrument(skip(db, dto), fields(code = %dto.code))]
    pub async fn create_subject(db: &PgPool, dto: CreateSubjectDto) -> Result<Subject, AppError> {
        let subject = sqlx::query_as::<_, Subject>(&format!(
            r#"INSERT INTO subjects (name, code, description)
               VALUES ($1, $2, $3)
               RETURNING {SUBJECT_COLUMNS}"#
        ))
        .bind(dto.name.trim())
        .bind(normalize_subject_code(&dto.code))
        .bind(&dto.description)
        .fetch_one(db)
        .await
        .map_err(duplicate_code)?;

        info!(subject_id = %subject.id, "Subject created");
        Ok(subject)
    }

    #[instrument(skip(db))]
    pub async fn get_subjects(
        db: &PgPool,
        filters: SubjectFilterParams,
        pagination: PaginationParams,
    ) -> Result<Paginated<Subject>, AppError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM subjects");
        push_filters(&mut count_query, &filters);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await?;

        let mut data_query =
            QueryBuilder::<Postgres>::new(format!("SELECT {SUBJECT_COLUMNS} FROM subjects"));
        push_filters(&mut data_query, &filters);
        data_query.push(" ORDER BY name LIMIT ");
        data_query.push_bind(pagination.limit());
        data_query.push(" OFFSET ");
        data_query.push_bind(pagination.offset());

        let subjects = data_query.build_query_as::<Subject>().fetch_all(db).await?;

        Ok(Paginated::new(subjects, total, &pagination))
    }

    #[instrument(skip(db))]
    pub async fn get_subject(db: &PgPool, id: SubjectId) -> Result<Subject, AppError> {
        sqlx::query_as::<_, Subject>(&format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Subject not found")))
    }

    #[instrument(skip(db, dto))]
    pub async fn update_subject(
        db: &PgPool,
        id: SubjectId,
        dto: UpdateSubjectDto,
    ) -> Result<Subject, AppError> {
        sqlx::query_as::<_, Subject>(&format!(
            r#"UPDATE subjects
               SET name = COALESCE($2, name),
                   code = COALESCE($3, code),
                   description = CASE WHEN $6 THEN $4 ELSE description END,
                   is_active = COALESCE($5, is_active),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {SUBJECT_COLUMNS}"#
        ))
        .bind(id)
        .bind(dto.name.as_deref().map(str::trim))
        .bind(dto.code.as_deref().map(normalize_subject_code))
        .bind(dto.description.as_ref().and_then(Option::as_deref))
        .bind(dto.is_active)
        .bind(dto.description.is_some())
        .fetch_optional(db)
        .await
        .map_err(duplicate_code)?
        .ok_or_else(|| AppError::not_found(anyhow!("Subject not found")))
    }

    #[instrument(skip(db))]
    pub async fn delete_subject(db: &PgPool, id: SubjectId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM subjects WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Subject not found")));
        }

        Ok(())
    }
}

fn duplicate_code(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::conflict(anyhow!("A subject with this code already exists"))
        }
        _ => AppError::from(err),
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &SubjectFilterParams) {
    builder.push(" WHERE 1=1");

    if let Some(is_active) = filters.is_active {
        builder.push(" AND is_active = ");
        builder.push_bind(is_active);
    }
    if let Some(search) = &filters.search {
        let pattern = format!("%{}%", search.trim());
        builder.push(" AND (name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR code ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}
