//! Academic results and report cards.
//!
//! Scores are continuous assessment (0 to 40) plus exam (0 to 60). The total
//! and letter grade are computed when a result is written.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::{ClassroomId, ResultId, StudentId, SubjectId, TermId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Grade {
    pub fn from_total(total: f64) -> Self {
        match total {
            t if t >= 70.0 => Grade::A,
            t if t >= 60.0 => Grade::B,
            t if t >= 50.0 => Grade::C,
            t if t >= 45.0 => Grade::D,
            t if t >= 40.0 => Grade::E,
            _ => Grade::F,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
            Grade::F => "F",
        }
    }

    pub fn remark(&self) -> &'static str {
        match self {
            Grade::A => "Excellent",
            Grade::B => "Very good",
            Grade::C => "Good",
            Grade::D => "Fair",
            Grade::E => "Pass",
            Grade::F => "Fail",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct StudentResult {
    pub id: ResultId,
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub term_id: TermId,
    pub classroom_id: ClassroomId,
    pub ca_score: f64,
    pub exam_score: f64,
    pub total: f64,
    pub grade: String,
    pub remark: Option<String>,
    pub recorded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct ResultWithSubject {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub result: StudentResult,
    pub subject_name: String,
    pub subject_code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct ResultEntryDto {
    pub student_id: StudentId,
    #[validate(range(min = 0.0, max = 40.0, message = "CA score must be between 0 and 40"))]
    pub ca_score: f64,
    #[validate(range(min = 0.0, max = 60.0, message = "Exam score must be between 0 and 60"))]
    pub exam_score: f64,
    #[validate(length(max = 255))]
    pub remark: Option<String>,
}

impl ResultEntryDto {
    pub fn total(&self) -> f64 {
        self.ca_score + self.exam_score
    }
}

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct BulkResultsDto {
    pub classroom_id: ClassroomId,
    pub subject_id: SubjectId,
    pub term_id: TermId,
    #[validate(length(min = 1, message = "At least one entry is required"), nested)]
    pub entries: Vec<ResultEntryDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct BulkResultsResponse {
    pub recorded: usize,
    pub results: Vec<StudentResult>,
}

#[derive(Deserialize, Debug, Clone, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResultFilterParams {
    pub classroom_id: Option<ClassroomId>,
    pub subject_id: Option<SubjectId>,
    pub term_id: Option<TermId>,
    pub student_id: Option<StudentId>,
}

#[derive(Deserialize, Debug, Clone, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportCardParams {
    pub student_id: StudentId,
    pub term_id: TermId,
}

#[derive(Deserialize, Debug, Clone, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TermParams {
    pub term_id: Option<TermId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ReportCard {
    pub student_id: StudentId,
    pub student_name: String,
    pub admission_number: String,
    pub classroom_id: Option<ClassroomId>,
    pub term_id: TermId,
    pub term_name: String,
    pub subjects: Vec<ResultWithSubject>,
    pub grand_total: f64,
    pub average: f64,
    /// Competition rank by average within the classroom; `None` without results
    pub position: Option<i64>,
    pub class_size: i64,
}

/// Competition ranking ("1, 2, 2, 4"): a student's position is one more
/// than the number of classmates with a strictly higher average.
pub fn competition_position(averages: &[(StudentId, f64)], student_id: StudentId) -> Option<i64> {
    let own = averages
        .iter()
        .find(|(id, _)| *id == student_id)
        .map(|(_, avg)| *avg)?;
    let higher = averages.iter().filter(|(_, avg)| *avg > own).count() as i64;
    Some(higher + 1)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(Grade::from_total(100.0), Grade::A);
        assert_eq!(Grade::from_total(70.0), Grade::A);
        assert_eq!(Grade::from_total(69.5), Grade::B);
        assert_eq!(Grade::from_total(60.0), Grade::B);
        assert_eq!(Grade::from_total(50.0), Grade::C);
        assert_eq!(Grade::from_total(45.0), Grade::D);
        assert_eq!(Grade::from_total(40.0), Grade::E);
        assert_eq!(Grade::from_total(39.9), Grade::F);
        assert_eq!(Grade::from_total(0.0), Grade::F);
    }

    #[test]
    fn test_competition_ranking_shares_ties() {
        let a = StudentId::new();
        let b = StudentId::new();
        let c = StudentId::new();
        let d = StudentId::new();
        let averages = vec![(a, 81.0), (b, 74.5), (c, 74.5), (d, 60.0)];

        assert_eq!(competition_position(&averages, a), Some(1));
        assert_eq!(competition_position(&averages, b), Some(2));
        assert_eq!(competition_position(&averages, c), Some(2));
        assert_eq!(competition_position(&averages, d), Some(4));
        assert_eq!(competition_position(&averages, StudentId::new()), None);
    }

    #[test]
    fn test_score_ranges() {
        let over = ResultEntryDto {
            student_id: StudentId::new(),
            ca_score: 41.0,
            exam_score: 60.0,
            remark: None,
        };
        let errors = over.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("ca_score"));

        let ok = ResultEntryDto {
            student_id: StudentId::new(),
            ca_score: 40.0,
            exam_score: 60.0,
            remark: None,
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.total(), 100.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(66.666), 66.67);
    }
}
