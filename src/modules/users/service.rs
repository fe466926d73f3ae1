use anyhow::anyhow;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument};

use classdesk_core::{AppError, Paginated, PaginationParams, PasswordPolicy, hash_password};
use classdesk_models::auth::MessageResponse;
use classdesk_models::ids::UserId;
use classdesk_models::users::{
    CreateUserDto, ResetPasswordDto, UpdateUserDto, User, UserFilterParams, UserRole,
};

use crate::metrics::track_user_created;

const USER_COLUMNS: &str = "id, first_name, last_name, email, role, phone, is_active, \
     failed_login_attempts, locked_until, last_login_at, created_at, updated_at";

pub struct UserService;

impl UserService {
    #[instrument(skip(db, policy, dto), fields(email = %dto.email, role = %dto.role))]
    pub async fn create_user(
        db: &PgPool,
        policy: &PasswordPolicy,
        dto: CreateUserDto,
    ) -> Result<User, AppError> {
        policy.enforce(&dto.password)?;
        let hashed = hash_password(&dto.password)?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (first_name, last_name, email, password, role, phone)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(dto.first_name.trim())
        .bind(dto.last_name.trim())
        .bind(&dto.email)
        .bind(&hashed)
        .bind(dto.role)
        .bind(&dto.phone)
        .fetch_one(db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::conflict(anyhow!("A user with this email already exists"))
            }
            _ => AppError::from(e),
        })?;

        track_user_created(user.role.as_str());
        info!(user_id = %user.id, "User created");

        Ok(user)
    }

    #[instrument(skip(db))]
    pub async fn get_users(
        db: &PgPool,
        filters: UserFilterParams,
        pagination: PaginationParams,
    ) -> Result<Paginated<User>, AppError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_filters(&mut count_query, &filters);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await?;

        let mut data_query = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_filters(&mut data_query, &filters);
        data_query.push(" ORDER BY last_name, first_name LIMIT ");
        data_query.push_bind(pagination.limit());
        data_query.push(" OFFSET ");
        data_query.push_bind(pagination.offset());

        let users = data_query.build_query_as::<User>().fetch_all(db).await?;

        Ok(Paginated::new(users, total, &pagination))
    }

    #[instrument(skip(db))]
    pub async fn get_user(db: &PgPool, id: UserId) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("User not found")))
    }

    #[instrument(skip(db))]
    pub async fn update_user(db: &PgPool, id: UserId, dto: UpdateUserDto) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            r#"UPDATE users
               SET first_name = COALESCE($2, first_name),
                   last_name = COALESCE($3, last_name),
                   phone = CASE WHEN $7 THEN $4 ELSE phone END,
                   role = COALESCE($5, role),
                   is_active = COALESCE($6, is_active),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(id)
        .bind(dto.first_name.as_deref().map(str::trim))
        .bind(dto.last_name.as_deref().map(str::trim))
        .bind(dto.phone.as_ref().and_then(Option::as_deref))
        .bind(dto.role)
        .bind(dto.is_active)
        .bind(dto.phone.is_some())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("User not found")))
    }

    #[instrument(skip(db))]
    pub async fn delete_user(db: &PgPool, actor_id: UserId, id: UserId) -> Result<(), AppError> {
        if actor_id == id {
            return Err(AppError::bad_request(anyhow!(
                "You cannot delete your own account"
            )));
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("User not found")));
        }

        Ok(())
    }

    #[instrument(skip(db))]
    pub async fn unlock_user(db: &PgPool, id: UserId) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            r#"UPDATE users
               SET failed_login_attempts = 0, locked_until = NULL, updated_at = NOW()
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("User not found")))
    }

    /// Sets a new password chosen by an admin. Existing sessions of the user
    /// are invalidated through `password_changed_at`.
    #[instrument(skip(db, policy, dto))]
    pub async fn reset_password(
        db: &PgPool,
        policy: &PasswordPolicy,
        id: UserId,
        dto: ResetPasswordDto,
    ) -> Result<MessageResponse, AppError> {
        policy.enforce(&dto.new_password)?;
        let hashed = hash_password(&dto.new_password)?;

        let result = sqlx::query(
            r#"UPDATE users
               SET password = $2, password_changed_at = NOW(),
                   failed_login_attempts = 0, locked_until = NULL, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(&hashed)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("User not found")));
        }

        Ok(MessageResponse::new("Password reset successfully"))
    }

    /// Fails with 400 unless `id` is an existing user with `role`.
    #[instrument(skip(db))]
    pub async fn ensure_role(db: &PgPool, id: UserId, role: UserRole) -> Result<(), AppError> {
        let actual = sqlx::query_scalar::<_, UserRole>("SELECT role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;

        match actual {
            Some(actual) if actual == role => Ok(()),
            Some(_) => Err(AppError::bad_request(anyhow!("User {} is not a {}", id, role))),
            None => Err(AppError::bad_request(anyhow!("User {} does not exist", id))),
        }
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filters: &UserFilterParams) {
    builder.push(" WHERE 1=1");

    if let Some(role) = filters.role {
        builder.push(" AND role = ");
        builder.push_bind(role);
    }
    if let Some(is_active) = filters.is_active {
        builder.push(" AND is_active = ");
        builder.push_bind(is_active);
    }
    if let Some(search) = &filters.search {
        let pattern = format!("%{}%", search.trim());
        builder.push(" AND (first_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR last_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR email ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}
