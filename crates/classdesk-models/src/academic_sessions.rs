//! Academic sessions (school years). At most one session is current.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::ids::SessionId;
use crate::validation::ordered_dates;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AcademicSession {
    pub id: SessionId,
    /// e.g. `2025/2026`
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AcademicSessionWithStats {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub session: AcademicSession,
    pub term_count: i64,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_dates"))]
pub struct CreateSessionDto {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_update_dates"))]
pub struct UpdateSessionDto {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn validate_create_dates(dto: &CreateSessionDto) -> Result<(), ValidationError> {
    ordered_dates(dto.start_date, dto.end_date)
}

fn validate_update_dates(dto: &UpdateSessionDto) -> Result<(), ValidationError> {
    match (dto.start_date, dto.end_date) {
        (Some(start), Some(end)) => ordered_dates(start, end),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_create_session_validation() {
        let ok = CreateSessionDto {
            name: "2025/2026".into(),
            start_date: date(2025, 9, 1),
            end_date: date(2026, 7, 31),
        };
        assert!(ok.validate().is_ok());

        let reversed = CreateSessionDto {
            name: "2025/2026".into(),
            start_date: date(2026, 7, 31),
            end_date: date(2025, 9, 1),
        };
        assert!(reversed.validate().is_err());
    }

    #[test]
    fn test_partial_update_skips_date_check() {
        let dto = UpdateSessionDto {
            start_date: Some(date(2026, 1, 1)),
            ..Default::default()
        };
        assert!(dto.validate().is_ok());
    }
}
