use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{info, instrument};

use classdesk_core::AppError;
use classdesk_models::ids::UserId;

/// Why a token was blacklisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationReason {
    Rotated,
    Logout,
}

impl RevocationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationReason::Rotated => "rotated",
            RevocationReason::Logout => "logout",
        }
    }
}

/// A token to blacklist until its own expiry.
#[derive(Debug, Clone)]
pub struct RevokedToken<'a> {
    pub jti: &'a str,
    pub user_id: UserId,
    pub token_type: &'a str,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenBlacklistService;

impl TokenBlacklistService {
    /// Blacklists a token. Returns `false` if the `jti` was already present,
    /// which callers use to detect a concurrent second use of a refresh token.
    #[instrument(skip(db))]
    pub async fn revoke(
        db: &PgPool,
        token: RevokedToken<'_>,
        reason: RevocationReason,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"INSERT INTO token_blacklist (jti, user_id, token_type, reason, expires_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (jti) DO NOTHING"#,
        )
        .bind(token.jti)
        .bind(token.user_id)
        .bind(token.token_type)
        .bind(reason.as_str())
        .bind(token.expires_at)
        .execute(db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(db))]
    pub async fn is_revoked(db: &PgPool, jti: &str) -> Result<bool, AppError> {
        let revoked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM token_blacklist WHERE jti = $1)",
        )
        .bind(jti)
        .fetch_one(db)
        .await?;

        Ok(revoked)
    }

    /// Deletes entries whose token has expired anyway.
    #[instrument(skip(db))]
    pub async fn purge_expired(db: &PgPool) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at <= NOW()")
            .execute(db)
            .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            info!(purged, "Purged expired blacklist entries");
        }

        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_names() {
        assert_eq!(RevocationReason::Rotated.as_str(), "rotated");
        assert_eq!(RevocationReason::Logout.as_str(), "logout");
    }
}
