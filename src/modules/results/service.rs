use anyhow::anyhow;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument};
use uuid::Uuid;

use classdesk_core::AppError;
use classdesk_models::ids::{ClassroomId, ResultId, StudentId, TermId, UserId};
use classdesk_models::results::{
    BulkResultsDto, BulkResultsResponse, Grade, ReportCard, ResultFilterParams,
    ResultWithSubject, StudentResult, competition_position, round2,
};

use crate::modules::attendance::service::{first_duplicate, missing_from};
use crate::modules::classrooms::service::ClassroomService;
use crate::modules::students::service::StudentService;

const RESULT_COLUMNS: &str = "r.id, r.student_id, r.subject_id, r.term_id, r.classroom_id, \
     r.ca_score, r.exam_score, r.total, r.grade, r.remark, r.recorded_by, r.created_at, \
     r.updated_at";

pub struct ResultService;

impl ResultService {
    /// Writes one subject's scores for a classroom and term. Existing
    /// results for the same student, subject and term are replaced.
    #[instrument(skip(db, dto), fields(classroom_id = %dto.classroom_id, subject_id = %dto.subject_id, entries = dto.entries.len()))]
    pub async fn record_bulk(
        db: &PgPool,
        recorded_by: UserId,
        dto: BulkResultsDto,
    ) -> Result<BulkResultsResponse, AppError> {
        let student_ids: Vec<StudentId> = dto.entries.iter().map(|e| e.student_id).collect();
        if let Some(duplicate) = first_duplicate(&student_ids) {
            return Err(AppError::bad_request(anyhow!(
                "Student {} appears more than once",
                duplicate
            )));
        }

        ClassroomService::ensure_exists(db, dto.classroom_id).await?;

        let offered = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM classroom_subjects WHERE classroom_id = $1 AND subject_id = $2)",
        )
        .bind(dto.classroom_id)
        .bind(dto.subject_id)
        .fetch_one(db)
        .await?;
        if !offered {
            return Err(AppError::bad_request(anyhow!(
                "Subject is not taught in this classroom"
            )));
        }

        let ids: Vec<Uuid> = student_ids.iter().map(|id| id.into_inner()).collect();
        let enrolled = sqlx::query_scalar::<_, StudentId>(
            "SELECT id FROM students WHERE classroom_id = $1 AND id = ANY($2)",
        )
        .bind(dto.classroom_id)
        .bind(ids)
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
        let mut results = Vec::with_capacity(dto.entries.len());

        for entry in &dto.entries {
            let total = round2(entry.total());
            let grade = Grade::from_total(total);

            let result = sqlx::query_as::<_, StudentResult>(
                r#"INSERT INTO results
                       (student_id, subject_id, term_id, classroom_id, ca_score, exam_score,
                        total, grade, remark, recorded_by)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                   ON CONFLICT (student_id, subject_id, term_id) DO UPDATE
                   SET classroom_id = EXCLUDED.classroom_id,
                       ca_score = EXCLUDED.ca_score,
                       exam_score = EXCLUDED.exam_score,
                       total = EXCLUDED.total,
                       grade = EXCLUDED.grade,
                       remark = EXCLUDED.remark,
                       recorded_by = EXCLUDED.recorded_by,
                       updated_at = NOW()
                   RETURNING id, student_id, subject_id, term_id, classroom_id, ca_score,
                             exam_score, total, grade, remark, recorded_by, created_at,
                             updated_at"#,
            )
            .bind(entry.student_id)
            .bind(dto.subject_id)
            .bind(dto.term_id)
            .bind(dto.classroom_id)
            .bind(entry.ca_score)
            .bind(entry.exam_score)
            .bind(total)
            .bind(grade.as_str())
            .bind(entry.remark.as_deref().or(Some(grade.remark())))
            .bind(recorded_by)
            .fetch_one(&mut *tx)
            .await?;

            results.push(result);
        }

        tx.commit().await?;

        info!("Results recorded");

        Ok(BulkResultsResponse {
            recorded: results.len(),
            results,
        })
    }

    #[instrument(skip(db))]
    pub async fn list(
        db: &PgPool,
        filters: &ResultFilterParams,
    ) -> Result<Vec<ResultWithSubject>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            r#"SELECT {RESULT_COLUMNS}, sub.name AS subject_name, sub.code AS subject_code
               FROM results r
               JOIN subjects sub ON sub.id = r.subject_id"#
        ));
        query.push(" WHERE 1=1");

        if let Some(classroom_id) = filters.classroom_id {
            query.push(" AND r.classroom_id = ");
            query.push_bind(classroom_id);
        }
        if let Some(subject_id) = filters.subject_id {
            query.push(" AND r.subject_id = ");
            query.push_bind(subject_id);
        }
        if let Some(term_id) = filters.term_id {
            query.push(" AND r.term_id = ");
            query.push_bind(term_id);
        }
        if let Some(student_id) = filters.student_id {
            query.push(" AND r.student_id = ");
            query.push_bind(student_id);
        }
        query.push(" ORDER BY sub.name, r.total DESC");

        let results = query
            .build_query_as::<ResultWithSubject>()
            .fetch_all(db)
            .await?;

        Ok(results)
    }

    /// A student's results, optionally for a single term.
    #[instrument(skip(db))]
    pub async fn get_student_results(
        db: &PgPool,
        student_id: StudentId,
        term_id: Option<TermId>,
    ) -> Result<Vec<ResultWithSubject>, AppError> {
        let filters = ResultFilterParams {
            student_id: Some(student_id),
            term_id,
            ..ResultFilterParams::default()
        };
        Self::list(db, &filters).await
    }

    #[instrument(skip(db))]
    pub async fn delete_result(db: &PgPool, id: ResultId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM results WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Result not found")));
        }

        Ok(())
    }

    /// Builds a term report card. The student is ranked against everyone
    /// with results in the same classroom and term.
    #[instrument(skip(db))]
    pub async fn report_card(
        db: &PgPool,
        student_id: StudentId,
        term_id: TermId,
    ) -> Result<ReportCard, AppError> {
        let student = StudentService::get_student(db, student_id).await?;

        let term_name = sqlx::query_scalar::<_, String>("SELECT name FROM terms WHERE id = $1")
            .bind(term_id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("Term not found")))?;

        let subjects = Self::get_student_results(db, student_id, Some(term_id)).await?;

        // Results keep the classroom they were recorded in, which may differ
        // from the student's current placement.
        let classroom_id: Option<ClassroomId> = subjects
            .first()
            .map(|r| r.result.classroom_id)
            .or(student.classroom_id);

        let averages = match classroom_id {
            Some(classroom_id) => {
                sqlx::query_as::<_, (StudentId, f64)>(
                    r#"SELECT student_id, AVG(total)
                       FROM results
                       WHERE classroom_id = $1 AND term_id = $2
                       GROUP BY student_id"#,
                )
                .bind(classroom_id)
                .bind(term_id)
                .fetch_all(db)
                .await?
            }
            None => Vec::new(),
        };

        let (grand_total, average) = totals(&subjects);

        Ok(ReportCard {
            student_id,
            student_name: format!("{} {}", student.first_name, student.last_name),
            admission_number: student.admission_number,
            classroom_id,
            term_id,
            term_name,
            subjects,
            grand_total,
            average,
            position: competition_position(&averages, student_id),
            class_size: averages.len() as i64,
        })
    }
}

/// Grand total and average over the subjects, rounded to two places.
pub fn totals(subjects: &[ResultWithSubject]) -> (f64, f64) {
    if subjects.is_empty() {
        return (0.0, 0.0);
    }
    let sum: f64 = subjects.iter().map(|s| s.result.total).sum();
    (round2(sum), round2(sum / subjects.len() as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use classdesk_models::ids::SubjectId;

    fn scored(total: f64) -> ResultWithSubject {
        ResultWithSubject {
            result: StudentResult {
                id: ResultId::new(),
                student_id: StudentId::new(),
                subject_id: SubjectId::new(),
                term_id: TermId::new(),
                classroom_id: ClassroomId::new(),
                ca_score: 0.0,
                exam_score: total,
                total,
                grade: Grade::from_total(total).to_string(),
                remark: None,
                recorded_by: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            subject_name: "Mathematics".to_string(),
            subject_code: "MTH".to_string(),
        }
    }

    #[test]
    fn test_totals_average_over_subjects() {
        let subjects = vec![scored(70.0), scored(55.5), scored(40.0)];
        assert_eq!(totals(&subjects), (165.5, 55.17));
    }

    #[test]
    fn test_totals_without_results() {
        assert_eq!(totals(&[]), (0.0, 0.0));
    }
}
