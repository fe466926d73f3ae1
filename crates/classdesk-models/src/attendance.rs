//! Daily attendance records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::{AttendanceId, ClassroomId, StudentId, UserId};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "attendance_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct Attendance {
    pub id: AttendanceId,
    pub student_id: StudentId,
    pub classroom_id: ClassroomId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remark: Option<String>,
    pub recorded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct AttendanceWithStudent {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub attendance: Attendance,
    pub student_name: String,
    pub admission_number: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct AttendanceRecordDto {
    pub student_id: StudentId,
    pub status: AttendanceStatus,
    #[validate(length(max = 255))]
    pub remark: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct BulkAttendanceDto {
    pub classroom_id: ClassroomId,
    pub date: NaiveDate,
    #[validate(length(min = 1, message = "At least one record is required"), nested)]
    pub records: Vec<AttendanceRecordDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct BulkAttendanceResponse {
    pub classroom_id: ClassroomId,
    pub date: NaiveDate,
    pub recorded: usize,
}

#[derive(Deserialize, Debug, Clone, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceFilterParams {
    pub classroom_id: Option<ClassroomId>,
    pub student_id: Option<StudentId>,
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, Clone, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceRangeParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, Clone, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceSummaryParams {
    pub student_id: StudentId,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct AttendanceSummary {
    pub student_id: StudentId,
    pub total: i64,
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    pub excused: i64,
    /// `(present + late) / total` as a ratio in `0.0..=1.0`, 0 when nothing
    /// was recorded
    pub attendance_rate: f64,
}

impl AttendanceSummary {
    /// Builds a summary from `(status, count)` pairs as returned by a
    /// `GROUP BY status` query.
    pub fn from_counts(student_id: StudentId, counts: &[(AttendanceStatus, i64)]) -> Self {
        let count_of = |status: AttendanceStatus| {
            counts
                .iter()
                .filter(|(s, _)| *s == status)
                .map(|(_, n)| *n)
                .sum::<i64>()
        };

        let present = count_of(AttendanceStatus::Present);
        let absent = count_of(AttendanceStatus::Absent);
        let late = count_of(AttendanceStatus::Late);
        let excused = count_of(AttendanceStatus::Excused);
        let total = present + absent + late + excused;

        Self {
            student_id,
            total,
            present,
            absent,
            late,
            excused,
            attendance_rate: attendance_rate(present + late, total),
        }
    }
}

/// Ratio in `0.0..=1.0` rounded to four decimals.
pub fn attendance_rate(attended: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let rate = attended as f64 / total as f64;
    (rate * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_late_as_attended() {
        let id = StudentId::new();
        let summary = AttendanceSummary::from_counts(
            id,
            &[
                (AttendanceStatus::Present, 6),
                (AttendanceStatus::Late, 2),
                (AttendanceStatus::Absent, 1),
                (AttendanceStatus::Excused, 1),
            ],
        );
        assert_eq!(summary.total, 10);
        assert_eq!(summary.attendance_rate, 0.8);
    }

    #[test]
    fn test_empty_summary_has_zero_rate() {
        let summary = AttendanceSummary::from_counts(StudentId::new(), &[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.attendance_rate, 0.0);
    }

    #[test]
    fn test_rate_rounding() {
        assert_eq!(attendance_rate(2, 3), 0.6667);
        assert_eq!(attendance_rate(3, 3), 1.0);
    }

    #[test]
    fn test_bulk_requires_records() {
        let dto = BulkAttendanceDto {
            classroom_id: ClassroomId::new(),
            date: NaiveDate::from_ymd_opt(2025, 10, 6).unwrap(),
            records: vec![],
        };
        assert!(dto.validate().is_err());
    }
}
