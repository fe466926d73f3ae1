use anyhow::anyhow;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument};

use classdesk_core::{AppError, Paginated, PaginationParams};
use classdesk_models::classrooms::{
    AssignSubjectDto, Classroom, ClassroomFilterParams, ClassroomSubject, ClassroomWithStats,
    CreateClassroomDto, UpdateClassroomDto,
};
use classdesk_models::ids::{ClassroomId, SubjectId};
use classdesk_models::students::Student;
use classdesk_models::users::UserRole;

use crate::modules::students::service::StudentService;
use crate::modules::users::service::UserService;

const CLASSROOM_WITH_STATS: &str = r#"SELECT c.id, c.name, c.level, c.section, c.capacity,
       c.class_teacher_id, c.is_active, c.created_at, c.updated_at,
       (SELECT COUNT(*) FROM students s WHERE s.classroom_id = c.id) AS student_count
FROM classrooms c"#;

const CLASSROOM_SUBJECTS: &str = r#"SELECT cs.classroom_id, cs.subject_id, sub.name AS subject_name,
       sub.code AS subject_code, cs.teacher_id,
       CASE WHEN t.id IS NULL THEN NULL ELSE t.first_name || ' ' || t.last_name END AS teacher_name
FROM classroom_subjects cs
JOIN subjects sub ON sub.id = cs.subject_id
LEFT JOIN users t ON t.id = cs.teacher_id"#;

pub struct ClassroomService;

impl ClassroomService {
    #[instrument(skip(db, dto), fields(name = %dto.name))]
    pub async fn create_classroom(
        db: &PgPool,
        dto: CreateClassroomDto,
    ) -> Result<Classroom, AppError> {
        if let Some(teacher_id) = dto.class_teacher_id {
            UserService::ensure_role(db, teacher_id, UserRole::Teacher).await?;
        }

        let classroom = sqlx::query_as::<_, Classroom>(
            r#"INSERT INTO classrooms (name, level, section, capacity, class_teacher_id)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, name, level, section, capacity, class_teacher_id, is_active,
                         created_at, updated_at"#,
        )
        .bind(dto.name.trim())
        .bind(dto.level.trim())
        .bind(&dto.section)
        .bind(dto.capacity)
        .bind(dto.class_teacher_id)
        .fetch_one(db)
        .await
        .map_err(duplicate_name)?;

        info!(classroom_id = %classroom.id, "Classroom created");
        Ok(classroom)
    }

    #[instrument(skip(db))]
    pub async fn get_classrooms(
        db: &PgPool,
        filters: ClassroomFilterParams,
        pagination: PaginationParams,
    ) -> Result<Paginated<ClassroomWithStats>, AppError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM classrooms c");
        push_filters(&mut count_query, &filters);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await?;

        let mut data_query = QueryBuilder::<Postgres>::new(CLASSROOM_WITH_STATS);
        push_filters(&mut data_query, &filters);
        data_query.push(" ORDER BY c.level, c.name LIMIT ");
        data_query.push_bind(pagination.limit());
        data_query.push(" OFFSET ");
        data_query.push_bind(pagination.offset());

        let classrooms = data_query
            .build_query_as::<ClassroomWithStats>()
            .fetch_all(db)
            .await?;

        Ok(Paginated::new(classrooms, total, &pagination))
    }

    #[instrument(skip(db))]
    pub async fn get_classroom(
        db: &PgPool,
        id: ClassroomId,
    ) -> Result<ClassroomWithStats, AppError> {
        sqlx::query_as::<_, ClassroomWithStats>(&format!("{CLASSROOM_WITH_STATS} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("Classroom not found")))
    }

    #[instrument(skip(db, dto))]
    pub async fn update_classroom(
        db: &PgPool,
        id: ClassroomId,
        dto: UpdateClassroomDto,
    ) -> Result<Classroom, AppError> {
        if let Some(Some(teacher_id)) = dto.class_teacher_id {
            UserService::ensure_role(db, teacher_id, UserRole::Teacher).await?;
        }

        if let Some(capacity) = dto.capacity {
            let current = Self::get_classroom(db, id).await?;
            if current.student_count > i64::from(capacity) {
                return Err(AppError::bad_request(anyhow!(
                    "Capacity cannot be below the current enrollment of {}",
                    current.student_count
                )));
            }
        }

        sqlx::query_as::<_, Classroom>(
            r#"UPDATE classrooms
               SET name = COALESCE($2, name),
                   level = COALESCE($3, level),
                   section = CASE WHEN $8 THEN $4 ELSE section END,
                   capacity = COALESCE($5, capacity),
                   class_teacher_id = CASE WHEN $9 THEN $6 ELSE class_teacher_id END,
                   is_active = COALESCE($7, is_active),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING id, name, level, section, capacity, class_teacher_id, is_active,
                         created_at, updated_at"#,
        )
        .bind(id)
        .bind(dto.name.as_deref().map(str::trim))
        .bind(dto.level.as_deref().map(str::trim))
        .bind(dto.section.as_ref().and_then(Option::as_deref))
        .bind(dto.capacity)
        .bind(dto.class_teacher_id.flatten())
        .bind(dto.is_active)
        .bind(dto.section.is_some())
        .bind(dto.class_teacher_id.is_some())
        .fetch_optional(db)
        .await
        .map_err(duplicate_name)?
        .ok_or_else(|| AppError::not_found(anyhow!("Classroom not found")))
    }

    #[instrument(skip(db))]
    pub async fn delete_classroom(db: &PgPool, id: ClassroomId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM classrooms WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Classroom not found")));
        }

        Ok(())
    }

    #[instrument(skip(db))]
    pub async fn get_classroom_students(
        db: &PgPool,
        id: ClassroomId,
    ) -> Result<Vec<Student>, AppError> {
        Self::ensure_exists(db, id).await?;
        StudentService::get_students_in_classroom(db, id).await
    }

    #[instrument(skip(db))]
    pub async fn get_subjects(
        db: &PgPool,
        id: ClassroomId,
    ) -> Result<Vec<ClassroomSubject>, AppError> {
        Self::ensure_exists(db, id).await?;

        let subjects = sqlx::query_as::<_, ClassroomSubject>(&format!(
            "{CLASSROOM_SUBJECTS} WHERE cs.classroom_id = $1 ORDER BY sub.name"
        ))
        .bind(id)
        .fetch_all(db)
        .await?;

        Ok(subjects)
    }

    /// Adds a subject to the classroom, or changes the teacher of an
    /// existing assignment.
    #[instrument(skip(db))]
    pub async fn assign_subject(
        db: &PgPool,
        id: ClassroomId,
        dto: AssignSubjectDto,
    ) -> Result<ClassroomSubject, AppError> {
        Self::ensure_exists(db, id).await?;
        if let Some(teacher_id) = dto.teacher_id {
            UserService::ensure_role(db, teacher_id, UserRole::Teacher).await?;
        }

        sqlx::query(
            r#"INSERT INTO classroom_subjects (classroom_id, subject_id, teacher_id)
               VALUES ($1, $2, $3)
               ON CONFLICT (classroom_id, subject_id) DO UPDATE SET teacher_id = EXCLUDED.teacher_id"#,
        )
        .bind(id)
        .bind(dto.subject_id)
        .bind(dto.teacher_id)
        .execute(db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                AppError::bad_request(anyhow!("Subject does not exist"))
            }
            _ => AppError::from(e),
        })?;

        let assignment = sqlx::query_as::<_, ClassroomSubject>(&format!(
            "{CLASSROOM_SUBJECTS} WHERE cs.classroom_id = $1 AND cs.subject_id = $2"
        ))
        .bind(id)
        .bind(dto.subject_id)
        .fetch_one(db)
        .await?;

        Ok(assignment)
    }

    #[instrument(skip(db))]
    pub async fn remove_subject(
        db: &PgPool,
        id: ClassroomId,
        subject_id: SubjectId,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "DELETE FROM classroom_subjects WHERE classroom_id = $1 AND subject_id = $2",
        )
        .bind(id)
        .bind(subject_id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!(
                "Subject is not assigned to this classroom"
            )));
        }

        Ok(())
    }

    pub async fn ensure_exists(db: &PgPool, id: ClassroomId) -> Result<(), AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM classrooms WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(db)
        .await?;

        if !exists {
            return Err(AppError::not_found(anyhow!("Classroom not found")));
        }
        Ok(())
    }
}

fn duplicate_name(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::conflict(anyhow!("A classroom with this name already exists"))
        }
        _ => AppError::from(err),
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &ClassroomFilterParams) {
    builder.push(" WHERE 1=1");

    if let Some(level) = &filters.level {
        builder.push(" AND c.level = ");
        builder.push_bind(level.clone());
    }
    if let Some(is_active) = filters.is_active {
        builder.push(" AND c.is_active = ");
        builder.push_bind(is_active);
    }
    if let Some(search) = &filters.search {
        builder.push(" AND c.name ILIKE ");
        builder.push_bind(format!("%{}%", search.trim()));
    }
}
