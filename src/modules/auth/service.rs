use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use tracing::{info, instrument, warn};

use classdesk_auth::{
    ACCESS_TOKEN_TYPE, Claims, REFRESH_TOKEN_TYPE, TokenPair, create_token_pair, subject_id,
    timestamp_to_datetime, verify_refresh_token,
};
use classdesk_config::{JwtConfig, SecurityConfig};
use classdesk_core::{AppError, PasswordPolicy, hash_password, verify_password};
use classdesk_models::audit::NewAuditLog;
use classdesk_models::auth::{ChangePasswordRequest, LoginRequest, LoginResponse, TokenResponse};
use classdesk_models::ids::UserId;
use classdesk_models::users::{User, UserCredentials, UserRole};
use classdesk_models::value_types::Email;

use crate::metrics::{
    track_account_locked, track_jwt_issued, track_token_refreshed, track_user_login_failure,
    track_user_login_success,
};
use crate::modules::audit_logs::service::AuditService;
use crate::modules::auth::blacklist::{RevocationReason, RevokedToken, TokenBlacklistService};
use crate::modules::auth::lockout::{LockState, lock_deadline, lock_state, locked_message};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const TOKEN_TYPE_BEARER: &str = "Bearer";

/// What the session check needs to know about the token's user.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub role: UserRole,
    pub is_active: bool,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

/// Decides whether a verified token still represents a live session.
pub fn check_session(row: Option<SessionRow>, issued_at: usize) -> Result<UserRole, AppError> {
    let row = row.ok_or_else(|| AppError::unauthorized("User no longer exists".to_string()))?;

    if row.revoked {
        return Err(AppError::unauthorized("Token has been revoked".to_string()));
    }
    if !row.is_active {
        return Err(AppError::unauthorized("Account is deactivated".to_string()));
    }
    if issued_before_password_change(issued_at, row.password_changed_at) {
        return Err(AppError::unauthorized(
            "Token was issued before the last password change".to_string(),
        ));
    }

    Ok(row.role)
}

fn issued_before_password_change(issued_at: usize, changed_at: Option<DateTime<Utc>>) -> bool {
    changed_at.is_some_and(|changed| (issued_at as i64) < changed.timestamp())
}

pub struct AuthService;

impl AuthService {
    #[instrument(skip(db, claims), fields(jti = %claims.jti))]
    pub async fn validate_session(
        db: &PgPool,
        user_id: UserId,
        claims: &Claims,
    ) -> Result<UserRole, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"SELECT u.role, u.is_active, u.password_changed_at,
                      EXISTS(SELECT 1 FROM token_blacklist b WHERE b.jti = $2) AS revoked
               FROM users u
               WHERE u.id = $1"#,
        )
        .bind(user_id)
        .bind(&claims.jti)
        .fetch_optional(db)
        .await?;

        check_session(row, claims.iat)
    }

    async fn find_credentials_by_email(
        db: &PgPool,
        email: &Email,
    ) -> Result<Option<UserCredentials>, AppError> {
        let credentials = sqlx::query_as::<_, UserCredentials>(
            r#"SELECT id, email, password, role, is_active, failed_login_attempts, locked_until,
                      password_changed_at
               FROM users WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;

        Ok(credentials)
    }

    async fn find_credentials_by_id(
        db: &PgPool,
        user_id: UserId,
    ) -> Result<Option<UserCredentials>, AppError> {
        let credentials = sqlx::query_as::<_, UserCredentials>(
            r#"SELECT id, email, password, role, is_active, failed_login_attempts, locked_until,
                      password_changed_at
               FROM users WHERE id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;

        Ok(credentials)
    }

    /// Increments the failure counter and locks the account when it reaches
    /// the threshold. Returns the new `locked_until`.
    async fn record_failed_attempt(
        db: &PgPool,
        user_id: UserId,
        security: &SecurityConfig,
    ) -> Result<Option<DateTime<Utc>>, AppError> {
        let deadline = lock_deadline(Utc::now(), security.lockout_minutes);

        let locked_until = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"UPDATE users
               SET failed_login_attempts = failed_login_attempts + 1,
                   locked_until = CASE
                       WHEN failed_login_attempts + 1 >= $2 THEN $3
                       ELSE locked_until
                   END,
                   updated_at = NOW()
               WHERE id = $1
               RETURNING locked_until"#,
        )
        .bind(user_id)
        .bind(security.max_failed_logins)
        .bind(deadline)
        .fetch_one(db)
        .await?;

        Ok(locked_until)
    }

    async fn clear_lockout(db: &PgPool, user_id: UserId) -> Result<(), AppError> {
        sqlx::query(
            r#"UPDATE users SET failed_login_attempts = 0, locked_until = NULL, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(user_id)
        .execute(db)
        .await?;

        Ok(())
    }

    async fn record_successful_login(db: &PgPool, user_id: UserId) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"UPDATE users
               SET failed_login_attempts = 0, locked_until = NULL, last_login_at = NOW(),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING id, first_name, last_name, email, role, phone, is_active,
                         failed_login_attempts, locked_until, last_login_at, created_at, updated_at"#,
        )
        .bind(user_id)
        .fetch_one(db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(db, jwt_config, security, dto), fields(email = %dto.email))]
    pub async fn login(
        db: &PgPool,
        jwt_config: &JwtConfig,
        security: &SecurityConfig,
        dto: LoginRequest,
        ip: &str,
    ) -> Result<LoginResponse, AppError> {
        let email = Email::new(&dto.email)
            .map_err(|_| AppError::unauthorized(INVALID_CREDENTIALS.to_string()))?;

        let Some(credentials) = Self::find_credentials_by_email(db, &email).await? else {
            track_user_login_failure("unknown_email");
            AuditService::spawn_record(
                db,
                NewAuditLog::event("auth.login_failed", "auth")
                    .ip(Some(ip.to_string()))
                    .details(json!({ "email": email.as_str(), "reason": "unknown_email" })),
            );
            return Err(AppError::unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        match lock_state(credentials.locked_until, Utc::now()) {
            LockState::Locked { remaining_minutes } => {
                track_user_login_failure("locked");
                return Err(AppError::locked(locked_message(remaining_minutes)));
            }
            LockState::Expired => Self::clear_lockout(db, credentials.id).await?,
            LockState::Open => {}
        }

        if !verify_password(&dto.password, &credentials.password)? {
            let locked_until = Self::record_failed_attempt(db, credentials.id, security).await?;
            track_user_login_failure("invalid_password");
            AuditService::spawn_record(
                db,
                NewAuditLog::event("auth.login_failed", "auth")
                    .actor(credentials.id)
                    .entity(credentials.id)
                    .ip(Some(ip.to_string()))
                    .details(json!({ "reason": "invalid_password" })),
            );

            if let LockState::Locked { remaining_minutes } = lock_state(locked_until, Utc::now()) {
                warn!(user_id = %credentials.id, "Account locked after repeated failed logins");
                track_account_locked();
                AuditService::spawn_record(
                    db,
                    NewAuditLog::event("auth.account_locked", "auth")
                        .actor(credentials.id)
                        .entity(credentials.id)
                        .ip(Some(ip.to_string()))
                        .details(json!({ "max_failed_logins": security.max_failed_logins })),
                );
                return Err(AppError::locked(locked_message(remaining_minutes)));
            }

            return Err(AppError::unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        if !credentials.is_active {
            track_user_login_failure("inactive");
            return Err(AppError::forbidden("Account is deactivated".to_string()));
        }

        let user = Self::record_successful_login(db, credentials.id).await?;
        let pair = create_token_pair(
            user.id.into_inner(),
            user.email.as_str(),
            user.role.as_str(),
            jwt_config,
        )?;

        track_user_login_success(user.role.as_str());
        track_jwt_issued();
        AuditService::spawn_record(
            db,
            NewAuditLog::event("auth.login_success", "auth")
                .actor(user.id)
                .entity(user.id)
                .ip(Some(ip.to_string())),
        );
        info!(user_id = %user.id, role = %user.role, "User logged in");

        Ok(LoginResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: pair.expires_in,
            user,
        })
    }

    /// Exchanges a refresh token for a new pair. The presented token is
    /// blacklisted; presenting it again fails.
    #[instrument(skip(db, jwt_config, refresh_token))]
    pub async fn refresh(
        db: &PgPool,
        jwt_config: &JwtConfig,
        refresh_token: &str,
        ip: &str,
    ) -> Result<TokenResponse, AppError> {
        let claims = verify_refresh_token(refresh_token, jwt_config)?;
        let user_id = UserId::from(subject_id(&claims.sub)?);

        if TokenBlacklistService::is_revoked(db, &claims.jti).await? {
            return Err(AppError::unauthorized(
                "Refresh token has been revoked".to_string(),
            ));
        }

        let credentials = Self::find_credentials_by_id(db, user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("User no longer exists".to_string()))?;

        if !credentials.is_active {
            return Err(AppError::unauthorized("Account is deactivated".to_string()));
        }
        if issued_before_password_change(claims.iat, credentials.password_changed_at) {
            return Err(AppError::unauthorized(
                "Refresh token was issued before the last password change".to_string(),
            ));
        }

        let newly_revoked = TokenBlacklistService::revoke(
            db,
            RevokedToken {
                jti: &claims.jti,
                user_id,
                token_type: REFRESH_TOKEN_TYPE,
                expires_at: timestamp_to_datetime(claims.exp),
            },
            RevocationReason::Rotated,
        )
        .await?;

        if !newly_revoked {
            return Err(AppError::unauthorized(
                "Refresh token has been revoked".to_string(),
            ));
        }

        let TokenPair {
            access_token,
            refresh_token,
            expires_in,
        } = create_token_pair(
            user_id.into_inner(),
            credentials.email.as_str(),
            credentials.role.as_str(),
            jwt_config,
        )?;

        track_token_refreshed();
        track_jwt_issued();
        AuditService::spawn_record(
            db,
            NewAuditLog::event("auth.token_refreshed", "auth")
                .actor(user_id)
                .entity(user_id)
                .ip(Some(ip.to_string())),
        );

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in,
        })
    }

    /// Blacklists the caller's access token and, when it belongs to the
    /// caller, the supplied refresh token.
    #[instrument(skip(db, jwt_config, access_claims, refresh_token))]
    pub async fn logout(
        db: &PgPool,
        jwt_config: &JwtConfig,
        user_id: UserId,
        access_claims: &Claims,
        refresh_token: Option<&str>,
        ip: &str,
    ) -> Result<(), AppError> {
        TokenBlacklistService::revoke(
            db,
            RevokedToken {
                jti: &access_claims.jti,
                user_id,
                token_type: ACCESS_TOKEN_TYPE,
                expires_at: timestamp_to_datetime(access_claims.exp),
            },
            RevocationReason::Logout,
        )
        .await?;

        let mut refresh_revoked = false;
        if let Some(token) = refresh_token {
            match verify_refresh_token(token, jwt_config) {
                Ok(claims) if subject_id(&claims.sub).ok() == Some(user_id.into_inner()) => {
                    TokenBlacklistService::revoke(
                        db,
                        RevokedToken {
                            jti: &claims.jti,
                            user_id,
                            token_type: REFRESH_TOKEN_TYPE,
                            expires_at: timestamp_to_datetime(claims.exp),
                        },
                        RevocationReason::Logout,
                    )
                    .await?;
                    refresh_revoked = true;
                }
                Ok(_) => warn!(user_id = %user_id, "Ignoring refresh token owned by another user"),
                Err(_) => warn!(user_id = %user_id, "Ignoring invalid refresh token on logout"),
            }
        }

        if let Err(err) = TokenBlacklistService::purge_expired(db).await {
            warn!(error = %err, "Failed to purge expired blacklist entries");
        }

        AuditService::spawn_record(
            db,
            NewAuditLog::event("auth.logout", "auth")
                .actor(user_id)
                .entity(user_id)
                .ip(Some(ip.to_string()))
                .details(json!({ "refresh_token_revoked": refresh_revoked })),
        );

        Ok(())
    }

    #[instrument(skip(db))]
    pub async fn get_current_user(db: &PgPool, user_id: UserId) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, first_name, last_name, email, role, phone, is_active,
                      failed_login_attempts, locked_until, last_login_at, created_at, updated_at
               FROM users WHERE id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("User not found")))
    }

    #[instrument(skip(db, policy, dto))]
    pub async fn change_password(
        db: &PgPool,
        policy: &PasswordPolicy,
        user_id: UserId,
        dto: ChangePasswordRequest,
        ip: &str,
    ) -> Result<(), AppError> {
        let credentials = Self::find_credentials_by_id(db, user_id)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow!("User not found")))?;

        if !verify_password(&dto.current_password, &credentials.password)? {
            return Err(AppError::bad_request(anyhow!(
                "Current password is incorrect"
            )));
        }

        policy.enforce(&dto.new_password)?;

        if dto.new_password == dto.current_password {
            return Err(AppError::bad_request(anyhow!(
                "New password must be different from the current password"
            )));
        }

        let hashed = hash_password(&dto.new_password)?;

        sqlx::query(
            r#"UPDATE users SET password = $2, password_changed_at = NOW(), updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(user_id)
        .bind(&hashed)
        .execute(db)
        .await?;

        AuditService::spawn_record(
            db,
            NewAuditLog::event("auth.password_changed", "auth")
                .actor(user_id)
                .entity(user_id)
                .ip(Some(ip.to_string())),
        );
        info!(user_id = %user_id, "Password changed");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::Duration;

    fn row() -> SessionRow {
        SessionRow {
            role: UserRole::Teacher,
            is_active: true,
            password_changed_at: None,
            revoked: false,
        }
    }

    #[test]
    fn test_live_session_returns_role() {
        assert_eq!(check_session(Some(row()), 1_700_000_000).unwrap(), UserRole::Teacher);
    }

    #[test]
    fn test_missing_user_is_unauthorized() {
        let err = check_session(None, 0).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_revoked_token_is_rejected() {
        let err = check_session(
            Some(SessionRow {
                revoked: true,
                ..row()
            }),
            0,
        )
        .unwrap_err();
        assert_eq!(err.message(), "Token has been revoked");
    }

    #[test]
    fn test_inactive_user_is_rejected() {
        let err = check_session(
            Some(SessionRow {
                is_active: false,
                ..row()
            }),
            0,
        )
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_token_older_than_password_change_is_rejected() {
        let changed = Utc::now();
        let issued = (changed - Duration::minutes(5)).timestamp() as usize;
        let err = check_session(
            Some(SessionRow {
                password_changed_at: Some(changed),
                ..row()
            }),
            issued,
        )
        .unwrap_err();
        assert!(err.message().contains("password change"));
    }

    #[test]
    fn test_token_newer_than_password_change_is_accepted() {
        let changed = Utc::now() - Duration::minutes(5);
        let issued = Utc::now().timestamp() as usize;
        assert!(
            check_session(
                Some(SessionRow {
                    password_changed_at: Some(changed),
                    ..row()
                }),
                issued,
            )
            .is_ok()
        );
    }
}
