use anyhow::anyhow;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{info, instrument};

use classdesk_core::{AppError, Paginated, PaginationParams};
use classdesk_models::academic_sessions::{
    AcademicSession, AcademicSessionWithStats, CreateSessionDto, UpdateSessionDto,
};
use classdesk_models::ids::SessionId;

const SESSION_COLUMNS: &str = "id, name, start_date, end_date, is_current, created_at, updated_at";

const SESSION_WITH_STATS: &str = r#"SELECT s.id, s.name, s.start_date, s.end_date, s.is_current,
       s.created_at, s.updated_at,
       (SELECT COUNT(*) FROM terms t WHERE t.session_id = s.id) AS term_count
FROM academic_sessions s"#;

pub struct AcademicSessionService;

impl AcademicSessionService {
    #[instrument(skip(db, dto), fields(name = %dto.name))]
    pub async fn create_session(
        db: &PgPool,
        dto: CreateSessionDto,
    ) -> Result<AcademicSession, AppError> {
        let session = sqlx::query_as::<_, AcademicSession>(&format!(
            r#"INSERT INTO academic_sessions (name, start_date, end_date)
               VALUES ($1, $2, $3)
               RETURNING {SESSION_COLUMNS}"#
        ))
        .bind(dto.name.trim())
        .bind(dto.start_date)
        .bind(dto.end_date)
        .fetch_one(db)
        .await
        .map_err(duplicate_name)?;

        info!(session_id = %session.id, "Academic session created");
        Ok(session)
    }

    #[instrument(skip(db))]
    pub async fn get_sessions(
        db: &PgPool,
        pagination: PaginationParams,
    ) -> Result<Paginated<AcademicSessionWithStats>, AppError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM academic_sessions")
            .fetch_one(db)
            .await?;

        let sessions = sqlx::query_as::<_, AcademicSessionWithStats>(&format!(
            "{SESSION_WITH_STATS} ORDER BY s.start_date DESC LIMIT $1 OFFSET $2"
        ))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(db)
        .await?;

        Ok(Paginated::new(sessions, total, &pagination))
    }

    #[instrument(skip(db))]
    pub async fn get_session(
        db: &PgPool,
        id: SessionId,
    ) -> Result<AcademicSessionWithStats, AppError> {
        sqlx::query_as::<_, AcademicSessionWithStats>(&format!(
            "{SESSION_WITH_STATS} WHERE s.id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Academic session not found")))
    }

    /// Date changes must keep the session ordered and every existing term
    /// inside it.
    #[instrument(skip(db, dto))]
    pub async fn update_session(
        db: &PgPool,
        id: SessionId,
        dto: UpdateSessionDto,
    ) -> Result<AcademicSession, AppError> {
        let current = Self::get_session(db, id).await?.session;
        let start_date = dto.start_date.unwrap_or(current.start_date);
        let end_date = dto.end_date.unwrap_or(current.end_date);

        if start_date >= end_date {
            return Err(AppError::bad_request(anyhow!(
                "Start date must be before end date"
            )));
        }

        if dto.start_date.is_some() || dto.end_date.is_some() {
            let stranded = count_terms_outside(db, id, start_date, end_date).await?;
            if stranded > 0 {
                return Err(AppError::bad_request(anyhow!(
                    "{} term(s) would fall outside the new session dates",
                    stranded
                )));
            }
        }

        sqlx::query_as::<_, AcademicSession>(&format!(
            r#"UPDATE academic_sessions
               SET name = COALESCE($2, name),
                   start_date = $3,
                   end_date = $4,
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {SESSION_COLUMNS}"#
        ))
        .bind(id)
        .bind(dto.name.as_deref().map(str::trim))
        .bind(start_date)
        .bind(end_date)
        .fetch_optional(db)
        .await
        .map_err(duplicate_name)?
        .ok_or_else(|| AppError::not_found(anyhow!("Academic session not found")))
    }

    /// Deletes the session and its terms. The current session cannot be
    /// deleted, nor can a session whose terms hold recorded results.
    #[instrument(skip(db))]
    pub async fn delete_session(db: &PgPool, id: SessionId) -> Result<(), AppError> {
        let session = Self::get_session(db, id).await?.session;
        if session.is_current {
            return Err(AppError::bad_request(anyhow!(
                "The current academic session cannot be deleted"
            )));
        }

        let has_results = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(
                SELECT 1 FROM results r
                JOIN terms t ON t.id = r.term_id
                WHERE t.session_id = $1
            )"#,
        )
        .bind(id)
        .fetch_one(db)
        .await?;
        if has_results {
            return Err(AppError::bad_request(anyhow!(
                "Academic session has recorded results and cannot be deleted"
            )));
        }

        sqlx::query("DELETE FROM academic_sessions WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;

        Ok(())
    }

    /// Marks the session current and clears the flag everywhere else in the
    /// same transaction. A current term belonging to another session stops
    /// being current too.
    #[instrument(skip(db))]
    pub async fn set_current(db: &PgPool, id: SessionId) -> Result<AcademicSession, AppError> {
        let mut tx = db.begin().await?;

        sqlx::query(
            "UPDATE academic_sessions SET is_current = FALSE, updated_at = NOW() WHERE is_current AND id <> $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let session = sqlx::query_as::<_, AcademicSession>(&format!(
            r#"UPDATE academic_sessions
               SET is_current = TRUE, updated_at = NOW()
               WHERE id = $1
               RETURNING {SESSION_COLUMNS}"#
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Academic session not found")))?;

        sqlx::query(
            "UPDATE terms SET is_current = FALSE, updated_at = NOW() WHERE is_current AND session_id <> $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(session_id = %session.id, "Current academic session changed");
        Ok(session)
    }

    #[instrument(skip(db))]
    pub async fn get_current(db: &PgPool) -> Result<AcademicSession, AppError> {
        sqlx::query_as::<_, AcademicSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM academic_sessions WHERE is_current"
        ))
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("No academic session is current")))
    }
}

async fn count_terms_outside(
    db: &PgPool,
    id: SessionId,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"SELECT COUNT(*) FROM terms
           WHERE session_id = $1 AND (start_date < $2 OR end_date > $3)"#,
    )
    .bind(id)
    .bind(start_date)
    .bind(end_date)
    .fetch_one(db)
    .await?;

    Ok(count)
}

fn duplicate_name(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::conflict(anyhow!("An academic session with this name already exists"))
        }
        _ => AppError::from(err),
    }
}
