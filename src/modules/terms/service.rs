use anyhow::anyhow;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{info, instrument};

use classdesk_core::AppError;
use classdesk_models::academic_sessions::AcademicSession;
use classdesk_models::ids::{SessionId, TermId};
use classdesk_models::terms::{CreateTermDto, Term, UpdateTermDto, check_term_dates};

const TERM_COLUMNS: &str =
    "id, session_id, name, sequence, start_date, end_date, is_current, created_at, updated_at";

pub struct TermService;

impl TermService {
    /// Checks the range against the session and the other terms of the
    /// session, leaving out `exclude` when updating.
    async fn validate_term_dates(
        db: &PgPool,
        session: &AcademicSession,
        start_date: NaiveDate,
        end_date: NaiveDate,
        exclude: Option<TermId>,
    ) -> Result<(), AppError> {
        let siblings: Vec<Term> = Self::load_session_terms(db, session.id)
            .await?
            .into_iter()
            .filter(|term| Some(term.id) != exclude)
            .collect();

        check_term_dates(
            start_date,
            end_date,
            session.start_date,
            session.end_date,
            &siblings,
        )
        .map_err(|problem| AppError::bad_request(anyhow!(problem.message())))
    }

    /// Creates a term. Without an explicit sequence the term is appended
    /// after the last one.
    #[instrument(skip(db, dto), fields(name = %dto.name))]
    pub async fn create_term(
        db: &PgPool,
        session_id: SessionId,
        dto: CreateTermDto,
    ) -> Result<Term, AppError> {
        let session = load_session(db, session_id).await?;
        Self::validate_term_dates(db, &session, dto.start_date, dto.end_date, None).await?;

        let sequence = match dto.sequence {
            Some(sequence) => sequence,
            None => {
                let max = sqlx::query_scalar::<_, Option<i32>>(
                    "SELECT MAX(sequence) FROM terms WHERE session_id = $1",
                )
                .bind(session_id)
                .fetch_one(db)
                .await?;
                max.unwrap_or(0) + 1
            }
        };

        let term = sqlx::query_as::<_, Term>(&format!(
            r#"INSERT INTO terms (session_id, name, sequence, start_date, end_date)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {TERM_COLUMNS}"#
        ))
        .bind(session_id)
        .bind(dto.name.trim())
        .bind(sequence)
        .bind(dto.start_date)
        .bind(dto.end_date)
        .fetch_one(db)
        .await
        .map_err(duplicate_term)?;

        info!(term_id = %term.id, sequence, "Term created");
        Ok(term)
    }

    #[instrument(skip(db))]
    pub async fn get_session_terms(
        db: &PgPool,
        session_id: SessionId,
    ) -> Result<Vec<Term>, AppError> {
        load_session(db, session_id).await?;
        Self::load_session_terms(db, session_id).await
    }

    async fn load_session_terms(db: &PgPool, session_id: SessionId) -> Result<Vec<Term>, AppError> {
        let terms = sqlx::query_as::<_, Term>(&format!(
            "SELECT {TERM_COLUMNS} FROM terms WHERE session_id = $1 ORDER BY sequence"
        ))
        .bind(session_id)
        .fetch_all(db)
        .await?;

        Ok(terms)
    }

    #[instrument(skip(db))]
    pub async fn get_term(db: &PgPool, id: TermId) -> Result<Term, AppError> {
        sqlx::query_as::<_, Term>(&format!("SELECT {TERM_COLUMNS} FROM terms WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("Term not found")))
    }

    #[instrument(skip(db))]
    pub async fn get_current_term(db: &PgPool) -> Result<Term, AppError> {
        sqlx::query_as::<_, Term>(&format!(
            "SELECT {TERM_COLUMNS} FROM terms WHERE is_current"
        ))
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("No term is current")))
    }

    #[instrument(skip(db, dto))]
    pub async fn update_term(db: &PgPool, id: TermId, dto: UpdateTermDto) -> Result<Term, AppError> {
        let current = Self::get_term(db, id).await?;
        let start_date = dto.start_date.unwrap_or(current.start_date);
        let end_date = dto.end_date.unwrap_or(current.end_date);

        if dto.start_date.is_some() || dto.end_date.is_some() {
            let session = load_session(db, current.session_id).await?;
            Self::validate_term_dates(db, &session, start_date, end_date, Some(id)).await?;
        }

        sqlx::query_as::<_, Term>(&format!(
            r#"UPDATE terms
               SET name = COALESCE($2, name),
                   sequence = COALESCE($3, sequence),
                   start_date = $4,
                   end_date = $5,
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {TERM_COLUMNS}"#
        ))
        .bind(id)
        .bind(dto.name.as_deref().map(str::trim))
        .bind(dto.sequence)
        .bind(start_date)
        .bind(end_date)
        .fetch_optional(db)
        .await
        .map_err(duplicate_term)?
        .ok_or_else(|| AppError::not_found(anyhow!("Term not found")))
    }

    /// Terms with recorded results cannot be deleted.
    #[instrument(skip(db))]
    pub async fn delete_term(db: &PgPool, id: TermId) -> Result<(), AppError> {
        let has_results = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM results WHERE term_id = $1)",
        )
        .bind(id)
        .fetch_one(db)
        .await?;
        if has_results {
            return Err(AppError::bad_request(anyhow!(
                "Term has recorded results and cannot be deleted"
            )));
        }

        let result = sqlx::query("DELETE FROM terms WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Term not found")));
        }

        Ok(())
    }

    /// Makes the term current across the whole school. Its session must be
    /// the current session.
    #[instrument(skip(db))]
    pub async fn set_current_term(db: &PgPool, id: TermId) -> Result<Term, AppError> {
        let term = Self::get_term(db, id).await?;
        let session = load_session(db, term.session_id).await?;

        if !session.is_current {
            return Err(AppError::bad_request(anyhow!(
                "Cannot set current term: its academic session is not current"
            )));
        }

        let mut tx = db.begin().await?;

        sqlx::query(
            "UPDATE terms SET is_current = FALSE, updated_at = NOW() WHERE is_current AND id <> $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let term = sqlx::query_as::<_, Term>(&format!(
            r#"UPDATE terms
               SET is_current = TRUE, updated_at = NOW()
               WHERE id = $1
               RETURNING {TERM_COLUMNS}"#
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(term_id = %term.id, "Current term changed");
        Ok(term)
    }
}

async fn load_session(db: &PgPool, id: SessionId) -> Result<AcademicSession, AppError> {
    sqlx::query_as::<_, AcademicSession>(
        r#"SELECT id, name, start_date, end_date, is_current, created_at, updated_at
           FROM academic_sessions WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::not_found(anyhow!("Academic session not found")))
}

fn duplicate_term(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::conflict(
            anyhow!("A term with this name or sequence already exists in this session"),
        ),
        _ => AppError::from(err),
    }
}
