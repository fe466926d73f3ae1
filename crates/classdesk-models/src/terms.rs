//! Terms within an academic session.
//!
//! Term dates must sit inside the session and must not overlap sibling
//! terms. At most one term is current across the whole school.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::ids::{SessionId, TermId};
use crate::validation::ordered_dates;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Term {
    pub id: TermId,
    pub session_id: SessionId,
    pub name: String,
    /// 1-based position within the session
    pub sequence: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_dates"))]
pub struct CreateTermDto {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Defaults to the next free sequence in the session
    #[validate(range(min = 1, max = 12))]
    pub sequence: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_update_dates"))]
pub struct UpdateTermDto {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(range(min = 1, max = 12))]
    pub sequence: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn validate_create_dates(dto: &CreateTermDto) -> Result<(), ValidationError> {
    ordered_dates(dto.start_date, dto.end_date)
}

fn validate_update_dates(dto: &UpdateTermDto) -> Result<(), ValidationError> {
    match (dto.start_date, dto.end_date) {
        (Some(start), Some(end)) => ordered_dates(start, end),
        _ => Ok(()),
    }
}

/// Why a term's dates were rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermDateProblem {
    Reversed,
    OutsideSession,
    Overlaps(String),
}

impl TermDateProblem {
    pub fn message(&self) -> String {
        match self {
            TermDateProblem::Reversed => "Start date must be before end date".to_string(),
            TermDateProblem::OutsideSession => {
                "Term dates must fall within the academic session".to_string()
            }
            TermDateProblem::Overlaps(name) => format!("Term dates overlap with term '{}'", name),
        }
    }
}

/// Checks a candidate term range against its session and sibling terms.
/// `siblings` must not include the term being updated.
pub fn check_term_dates(
    start: NaiveDate,
    end: NaiveDate,
    session_start: NaiveDate,
    session_end: NaiveDate,
    siblings: &[Term],
) -> Result<(), TermDateProblem> {
    if start >= end {
        return Err(TermDateProblem::Reversed);
    }
    if start < session_start || end > session_end {
        return Err(TermDateProblem::OutsideSession);
    }
    if let Some(clash) = siblings
        .iter()
        .find(|t| start <= t.end_date && t.start_date <= end)
    {
        return Err(TermDateProblem::Overlaps(clash.name.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn term(name: &str, start: NaiveDate, end: NaiveDate) -> Term {
        Term {
            id: TermId::new(),
            session_id: SessionId::new(),
            name: name.to_string(),
            sequence: 1,
            start_date: start,
            end_date: end,
            is_current: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_term_inside_session_without_siblings() {
        let result = check_term_dates(
            date(2025, 9, 8),
            date(2025, 12, 12),
            date(2025, 9, 1),
            date(2026, 7, 31),
            &[],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_term_outside_session() {
        let result = check_term_dates(
            date(2025, 8, 1),
            date(2025, 12, 12),
            date(2025, 9, 1),
            date(2026, 7, 31),
            &[],
        );
        assert_eq!(result, Err(TermDateProblem::OutsideSession));
    }

    #[test]
    fn test_overlapping_sibling() {
        let first = term("First Term", date(2025, 9, 8), date(2025, 12, 12));
        let result = check_term_dates(
            date(2025, 12, 12),
            date(2026, 3, 20),
            date(2025, 9, 1),
            date(2026, 7, 31),
            &[first],
        );
        assert_eq!(result, Err(TermDateProblem::Overlaps("First Term".into())));
    }

    #[test]
    fn test_adjacent_sibling_is_fine() {
        let first = term("First Term", date(2025, 9, 8), date(2025, 12, 12));
        let result = check_term_dates(
            date(2026, 1, 5),
            date(2026, 3, 20),
            date(2025, 9, 1),
            date(2026, 7, 31),
            &[first],
        );
        assert!(result.is_ok());
    }
}
