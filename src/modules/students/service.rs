use anyhow::anyhow;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument, warn};

use classdesk_config::FeeSyncConfig;
use classdesk_core::{AppError, Paginated, PaginationParams, PasswordPolicy, hash_password};
use classdesk_models::ids::{ClassroomId, StudentId, UserId};
use classdesk_models::students::{
    CreateStudentDto, LinkParentDto, Student, StudentFilterParams, UpdateStudentDto,
};
use classdesk_models::users::UserRole;

use crate::metrics::track_user_created;
use crate::modules::fees::sync::FeeSyncService;
use crate::modules::users::service::UserService;

pub(crate) const STUDENT_SELECT: &str = r#"SELECT s.id, s.user_id, u.first_name, u.last_name, u.email,
       s.admission_number, s.classroom_id, c.name AS classroom_name, s.parent_id,
       s.date_of_birth, s.gender, s.status, s.created_at, s.updated_at
FROM students s
JOIN users u ON u.id = s.user_id
LEFT JOIN classrooms c ON c.id = s.classroom_id"#;

pub struct StudentService;

impl StudentService {
    /// Creates the login account and the student record together.
    #[instrument(skip(db, policy, fee_sync, dto), fields(admission_number = %dto.admission_number))]
    pub async fn create_student(
        db: &PgPool,
        policy: &PasswordPolicy,
        fee_sync: &FeeSyncConfig,
        actor: UserId,
        dto: CreateStudentDto,
    ) -> Result<Student, AppError> {
        policy.enforce(&dto.password)?;
        if let Some(parent_id) = dto.parent_id {
            UserService::ensure_role(db, parent_id, UserRole::Parent).await?;
        }
        let hashed = hash_password(&dto.password)?;

        let mut tx = db.begin().await?;

        if let Some(classroom_id) = dto.classroom_id {
            ensure_capacity(&mut tx, classroom_id).await?;
        }

        let user_id = sqlx::query_scalar::<_, UserId>(
            r#"INSERT INTO users (first_name, last_name, email, password, role)
               VALUES ($1, $2, $3, $4, 'student')
               RETURNING id"#,
        )
        .bind(dto.first_name.trim())
        .bind(dto.last_name.trim())
        .bind(&dto.email)
        .bind(&hashed)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_as_conflict(e, "A user with this email already exists"))?;

        let student_id = sqlx::query_scalar::<_, StudentId>(
            r#"INSERT INTO students
                (user_id, admission_number, classroom_id, parent_id, date_of_birth, gender)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id"#,
        )
        .bind(user_id)
        .bind(dto.admission_number.trim())
        .bind(dto.classroom_id)
        .bind(dto.parent_id)
        .bind(dto.date_of_birth)
        .bind(dto.gender)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_as_conflict(e, "Admission number is already in use"))?;

        tx.commit().await?;

        track_user_created(UserRole::Student.as_str());
        info!(student_id = %student_id, "Student created");

        if let Some(classroom_id) = dto.classroom_id {
            sync_fees_after_placement(db, fee_sync, classroom_id, actor).await;
        }

        Self::get_student(db, student_id).await
    }

    #[instrument(skip(db))]
    pub async fn get_students(
        db: &PgPool,
        filters: StudentFilterParams,
        pagination: PaginationParams,
    ) -> Result<Paginated<Student>, AppError> {
        let mut count_query = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM students s JOIN users u ON u.id = s.user_id",
        );
        push_filters(&mut count_query, &filters);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await?;

        let mut data_query = QueryBuilder::<Postgres>::new(STUDENT_SELECT);
        push_filters(&mut data_query, &filters);
        data_query.push(" ORDER BY u.last_name, u.first_name LIMIT ");
        data_query.push_bind(pagination.limit());
        data_query.push(" OFFSET ");
        data_query.push_bind(pagination.offset());

        let students = data_query.build_query_as::<Student>().fetch_all(db).await?;

        Ok(Paginated::new(students, total, &pagination))
    }

    #[instrument(skip(db))]
    pub async fn get_student(db: &PgPool, id: StudentId) -> Result<Student, AppError> {
        sqlx::query_as::<_, Student>(&format!("{STUDENT_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("Student not found")))
    }

    /// The student record belonging to a login account.
    #[instrument(skip(db))]
    pub async fn get_student_by_user(db: &PgPool, user_id: UserId) -> Result<Student, AppError> {
        sqlx::query_as::<_, Student>(&format!("{STUDENT_SELECT} WHERE s.user_id = $1"))
            .bind(user_id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("No student record for this account")))
    }

    #[instrument(skip(db))]
    pub async fn get_students_in_classroom(
        db: &PgPool,
        classroom_id: ClassroomId,
    ) -> Result<Vec<Student>, AppError> {
        let students = sqlx::query_as::<_, Student>(&format!(
            "{STUDENT_SELECT} WHERE s.classroom_id = $1 ORDER BY u.last_name, u.first_name"
        ))
        .bind(classroom_id)
        .fetch_all(db)
        .await?;

        Ok(students)
    }

    #[instrument(skip(db))]
    pub async fn get_children(db: &PgPool, parent_id: UserId) -> Result<Vec<Student>, AppError> {
        let students = sqlx::query_as::<_, Student>(&format!(
            "{STUDENT_SELECT} WHERE s.parent_id = $1 ORDER BY u.first_name"
        ))
        .bind(parent_id)
        .fetch_all(db)
        .await?;

        Ok(students)
    }

    /// Moving a student to another classroom checks its capacity and bills
    /// the new classroom's fees.
    #[instrument(skip(db, fee_sync, dto))]
    pub async fn update_student(
        db: &PgPool,
        fee_sync: &FeeSyncConfig,
        actor: UserId,
        id: StudentId,
        dto: UpdateStudentDto,
    ) -> Result<Student, AppError> {
        let mut tx = db.begin().await?;

        let current = sqlx::query_as::<_, (UserId, Option<ClassroomId>)>(
            "SELECT user_id, classroom_id FROM students WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Student not found")))?;
        let (user_id, current_classroom) = current;

        let moved_to = dto
            .classroom_id
            .filter(|target| Some(*target) != current_classroom);
        if let Some(classroom_id) = moved_to {
            ensure_capacity(&mut tx, classroom_id).await?;
        }

        sqlx::query(
            r#"UPDATE users
               SET first_name = COALESCE($2, first_name),
                   last_name = COALESCE($3, last_name),
                   updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(user_id)
        .bind(dto.first_name.as_deref().map(str::trim))
        .bind(dto.last_name.as_deref().map(str::trim))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"UPDATE students
               SET admission_number = COALESCE($2, admission_number),
                   classroom_id = COALESCE($3, classroom_id),
                   date_of_birth = CASE WHEN $7 THEN $4 ELSE date_of_birth END,
                   gender = CASE WHEN $8 THEN $5 ELSE gender END,
                   status = COALESCE($6, status),
                   updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(dto.admission_number.as_deref().map(str::trim))
        .bind(dto.classroom_id)
        .bind(dto.date_of_birth.flatten())
        .bind(dto.gender.flatten())
        .bind(dto.status)
        .bind(dto.date_of_birth.is_some())
        .bind(dto.gender.is_some())
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_as_conflict(e, "Admission number is already in use"))?;

        tx.commit().await?;

        if let Some(classroom_id) = moved_to {
            info!(student_id = %id, classroom_id = %classroom_id, "Student moved");
            sync_fees_after_placement(db, fee_sync, classroom_id, actor).await;
        }

        Self::get_student(db, id).await
    }

    /// Deletes the student's login account, which removes the student
    /// record with it.
    #[instrument(skip(db))]
    pub async fn delete_student(db: &PgPool, id: StudentId) -> Result<(), AppError> {
        let result = sqlx::query(
            "DELETE FROM users WHERE id = (SELECT user_id FROM students WHERE id = $1)",
        )
        .bind(id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Student not found")));
        }

        Ok(())
    }

    #[instrument(skip(db))]
    pub async fn link_parent(
        db: &PgPool,
        id: StudentId,
        dto: LinkParentDto,
    ) -> Result<Student, AppError> {
        UserService::ensure_role(db, dto.parent_id, UserRole::Parent).await?;

        let result = sqlx::query(
            "UPDATE students SET parent_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(dto.parent_id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Student not found")));
        }

        Self::get_student(db, id).await
    }

    /// 403 unless the student is linked to `parent_id`.
    #[instrument(skip(db))]
    pub async fn ensure_child_of(
        db: &PgPool,
        parent_id: UserId,
        student_id: StudentId,
    ) -> Result<Student, AppError> {
        let student = Self::get_student(db, student_id).await?;
        if student.parent_id != Some(parent_id) {
            return Err(AppError::forbidden(
                "This student is not linked to your account".to_string(),
            ));
        }
        Ok(student)
    }
}

/// Whether a classroom with `capacity` seats can take one more student.
pub fn has_room(capacity: i32, enrolled: i64) -> bool {
    enrolled < i64::from(capacity)
}

/// Locks the classroom row so concurrent placements see each other, then
/// checks that a seat is free.
async fn ensure_capacity(conn: &mut PgConnection, classroom_id: ClassroomId) -> Result<(), AppError> {
    let capacity = sqlx::query_scalar::<_, i32>(
        "SELECT capacity FROM classrooms WHERE id = $1 FOR UPDATE",
    )
    .bind(classroom_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::bad_request(anyhow!("Classroom does not exist")))?;

    let enrolled = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM students WHERE classroom_id = $1",
    )
    .bind(classroom_id)
    .fetch_one(&mut *conn)
    .await?;

    if !has_room(capacity, enrolled) {
        return Err(AppError::bad_request(anyhow!("Classroom is full")));
    }

    Ok(())
}

/// The student is already saved at this point, so a failed sync is logged
/// and left for the next sync run.
async fn sync_fees_after_placement(
    db: &PgPool,
    config: &FeeSyncConfig,
    classroom_id: ClassroomId,
    actor: UserId,
) {
    if let Err(e) = FeeSyncService::sync_classroom(db, config, classroom_id, Some(actor)).await {
        warn!(classroom_id = %classroom_id, error = %e, "Fee sync after placement failed");
    }
}

fn unique_as_conflict(err: sqlx::Error, message: &'static str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::conflict(anyhow!(message))
        }
        _ => AppError::from(err),
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &StudentFilterParams) {
    builder.push(" WHERE 1=1");

    if let Some(classroom_id) = filters.classroom_id {
        builder.push(" AND s.classroom_id = ");
        builder.push_bind(classroom_id);
    }
    if let Some(status) = filters.status {
        builder.push(" AND s.status = ");
        builder.push_bind(status);
    }
    if let Some(search) = &filters.search {
        let pattern = format!("%{}%", search.trim());
        builder.push(" AND (u.first_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR u.last_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR u.email ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR s.admission_number ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_room() {
        assert!(has_room(30, 0));
        assert!(has_room(30, 29));
        assert!(!has_room(30, 30));
        assert!(!has_room(30, 31));
    }
}
