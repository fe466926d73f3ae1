use std::collections::HashSet;

use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument};
use uuid::Uuid;

use classdesk_core::{AppError, Paginated, PaginationParams};
use classdesk_models::attendance::{
    Attendance, AttendanceFilterParams, AttendanceRangeParams, AttendanceStatus,
    AttendanceSummary, AttendanceWithStudent, BulkAttendanceDto, BulkAttendanceResponse,
};
use classdesk_models::ids::{StudentId, UserId};

use crate::modules::classrooms::service::ClassroomService;

const ATTENDANCE_COLUMNS: &str = "a.id, a.student_id, a.classroom_id, a.date, a.status, a.remark, \
     a.recorded_by, a.created_at, a.updated_at";

pub struct AttendanceService;

impl AttendanceService {
    /// Records a classroom's register for one day. Re-submitting a day
    /// overwrites the earlier entries.
    #[instrument(skip(db, dto), fields(classroom_id = %dto.classroom_id, date = %dto.date, records = dto.records.len()))]
    pub async fn record_bulk(
        db: &PgPool,
        recorded_by: UserId,
        dto: BulkAttendanceDto,
    ) -> Result<BulkAttendanceResponse, AppError> {
        if dto.date > Utc::now().date_naive() {
            return Err(AppError::bad_request(anyhow!(
                "Attendance cannot be recorded for a future date"
            )));
        }

        let student_ids: Vec<StudentId> = dto.records.iter().map(|r| r.student_id).collect();
        if let Some(duplicate) = first_duplicate(&student_ids) {
            return Err(AppError::bad_request(anyhow!(
                "Student {} appears more than once",
                duplicate
            )));
        }

        ClassroomService::ensure_exists(db, dto.classroom_id).await?;

        let enrolled = sqlx::query_scalar::<_, StudentId>(
            "SELECT id FROM students WHERE classroom_id = $1 AND id = ANY($2)",
        )
        .bind(dto.classroom_id)
        .bind(to_uuids(&student_ids))
        .fetch_all(db)
        .await?;

        let outsiders = missing_from(&student_ids, &enrolled);
        if !outsiders.is_empty() {
            let listed = outsiders
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(AppError::bad_request(anyhow!(
                "Students not in this classroom: {}",
                listed
            )));
        }

        let mut tx = db.begin().await?;

        for record in &dto.records {
            sqlx::query(
                r#"INSERT INTO attendance (student_id, classroom_id, date, status, remark, recorded_by)
                   VALUES ($1, $2, $3, $4, $5, $6)
                   ON CONFLICT (student_id, date) DO UPDATE
                   SET classroom_id = EXCLUDED.classroom_id,
                       status = EXCLUDED.status,
                       remark = EXCLUDED.remark,
                       recorded_by = EXCLUDED.recorded_by,
                       updated_at = NOW()"#,
            )
            .bind(record.student_id)
            .bind(dto.classroom_id)
            .bind(dto.date)
            .bind(record.status)
            .bind(&record.remark)
            .bind(recorded_by)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!("Attendance recorded");

        Ok(BulkAttendanceResponse {
            classroom_id: dto.classroom_id,
            date: dto.date,
            recorded: dto.records.len(),
        })
    }

    #[instrument(skip(db))]
    pub async fn list(
        db: &PgPool,
        filters: AttendanceFilterParams,
        pagination: PaginationParams,
    ) -> Result<Paginated<AttendanceWithStudent>, AppError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM attendance a");
        push_filters(&mut count_query, &filters);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await?;

        let mut data_query = QueryBuilder::<Postgres>::new(format!(
            r#"SELECT {ATTENDANCE_COLUMNS},
                      u.first_name || ' ' || u.last_name AS student_name,
                      s.admission_number
               FROM attendance a
               JOIN students s ON s.id = a.student_id
               JOIN users u ON u.id = s.user_id"#
        ));
        push_filters(&mut data_query, &filters);
        data_query.push(" ORDER BY a.date DESC, u.last_name, u.first_name LIMIT ");
        data_query.push_bind(pagination.limit());
        data_query.push(" OFFSET ");
        data_query.push_bind(pagination.offset());

        let records = data_query
            .build_query_as::<AttendanceWithStudent>()
            .fetch_all(db)
            .await?;

        Ok(Paginated::new(records, total, &pagination))
    }

    /// A student's own records, newest first.
    #[instrument(skip(db))]
    pub async fn list_for_student(
        db: &PgPool,
        student_id: StudentId,
        range: &AttendanceRangeParams,
    ) -> Result<Vec<Attendance>, AppError> {
        let records = sqlx::query_as::<_, Attendance>(&format!(
            r#"SELECT {ATTENDANCE_COLUMNS}
               FROM attendance a
               WHERE a.student_id = $1
                 AND ($2::date IS NULL OR a.date >= $2)
                 AND ($3::date IS NULL OR a.date <= $3)
               ORDER BY a.date DESC"#
        ))
        .bind(student_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(db)
        .await?;

        Ok(records)
    }

    #[instrument(skip(db))]
    pub async fn summary(
        db: &PgPool,
        student_id: StudentId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<AttendanceSummary, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM students WHERE id = $1)",
        )
        .bind(student_id)
        .fetch_one(db)
        .await?;
        if !exists {
            return Err(AppError::not_found(anyhow!("Student not found")));
        }

        let counts = sqlx::query_as::<_, (AttendanceStatus, i64)>(
            r#"SELECT status, COUNT(*)
               FROM attendance
               WHERE student_id = $1
                 AND ($2::date IS NULL OR date >= $2)
                 AND ($3::date IS NULL OR date <= $3)
               GROUP BY status"#,
        )
        .bind(student_id)
        .bind(from)
        .bind(to)
        .fetch_all(db)
        .await?;

        Ok(AttendanceSummary::from_counts(student_id, &counts))
    }
}

/// The first id that occurs twice, if any.
pub fn first_duplicate(ids: &[StudentId]) -> Option<StudentId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().find(|id| !seen.insert(*id))
}

/// Ids in `requested` that are absent from `found`, in request order.
pub fn missing_from(requested: &[StudentId], found: &[StudentId]) -> Vec<StudentId> {
    let found: HashSet<_> = found.iter().collect();
    requested
        .iter()
        .filter(|id| !found.contains(id))
        .copied()
        .collect()
}

fn to_uuids(ids: &[StudentId]) -> Vec<Uuid> {
    ids.iter().map(|id| id.into_inner()).collect()
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &AttendanceFilterParams) {
    builder.push(" WHERE 1=1");

    if let Some(classroom_id) = filters.classroom_id {
        builder.push(" AND a.classroom_id = ");
        builder.push_bind(classroom_id);
    }
    if let Some(student_id) = filters.student_id {
        builder.push(" AND a.student_id = ");
        builder.push_bind(student_id);
    }
    if let Some(date) = filters.date {
        builder.push(" AND a.date = ");
        builder.push_bind(date);
    }
    if let Some(from) = filters.from {
        builder.push(" AND a.date >= ");
        builder.push_bind(from);
    }
    if let Some(to) = filters.to {
        builder.push(" AND a.date <= ");
        builder.push_bind(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_duplicate() {
        let a = StudentId::new();
        let b = StudentId::new();
        assert_eq!(first_duplicate(&[a, b]), None);
        assert_eq!(first_duplicate(&[a, b, a]), Some(a));
        assert_eq!(first_duplicate(&[]), None);
    }

    #[test]
    fn test_missing_from_keeps_request_order() {
        let a = StudentId::new();
        let b = StudentId::new();
        let c = StudentId::new();
        assert_eq!(missing_from(&[a, b, c], &[b]), vec![a, c]);
        assert!(missing_from(&[a, b], &[b, a]).is_empty());
    }
}
