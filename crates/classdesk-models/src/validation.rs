//! Shared validator helpers for DTOs.

use chrono::{NaiveDate, NaiveTime};
use validator::ValidationError;

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

pub fn ordered_dates(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if start < end {
        Ok(())
    } else {
        Err(invalid("date_range", "Start date must be before end date"))
    }
}

pub fn ordered_times(start: NaiveTime, end: NaiveTime) -> Result<(), ValidationError> {
    if start < end {
        Ok(())
    } else {
        Err(invalid("time_range", "Start time must be before end time"))
    }
}

/// Rejects strings that are empty once trimmed.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(invalid("blank", "Value cannot be blank"))
    } else {
        Ok(())
    }
}
