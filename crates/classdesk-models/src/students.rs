//! Student records.
//!
//! A student is a `users` row with role `student` plus a `students` row
//! holding school data (admission number, classroom, parent link).

use chrono::{DateTime, NaiveDate, Utc};
use classdesk_core::serde::{deserialize_nullable, deserialize_optional_string};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::{ClassroomId, StudentId, UserId};
use crate::value_types::Email;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "student_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Graduated,
    Withdrawn,
    Suspended,
}

/// Student joined with the user account and classroom name.
#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct Student {
    pub id: StudentId,
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub admission_number: String,
    pub classroom_id: Option<ClassroomId>,
    pub classroom_name: Option<String>,
    pub parent_id: Option<UserId>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub status: StudentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct CreateStudentDto {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub email: Email,
    pub password: String,
    #[validate(length(min = 1, max = 50, message = "Admission number is required"))]
    pub admission_number: String,
    pub classroom_id: Option<ClassroomId>,
    pub parent_id: Option<UserId>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
}

#[derive(Deserialize, Debug, Clone, Default, Validate, ToSchema)]
pub struct UpdateStudentDto {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub admission_number: Option<String>,
    /// Moving a student triggers fee synchronization for the new classroom
    pub classroom_id: Option<ClassroomId>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    #[schema(value_type = Option<NaiveDate>)]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    #[schema(value_type = Option<Gender>)]
    pub gender: Option<Option<Gender>>,
    pub status: Option<StudentStatus>,
}

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct LinkParentDto {
    pub parent_id: UserId,
}

#[derive(Deserialize, Debug, Clone, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudentFilterParams {
    pub classroom_id: Option<ClassroomId>,
    pub status: Option<StudentStatus>,
    /// Matches name, email or admission number
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&StudentStatus::Graduated).unwrap(),
            r#""graduated""#
        );
    }

    #[test]
    fn test_create_student_requires_admission_number() {
        let json = r#"{"first_name":"Ada","last_name":"Obi","email":"ada@school.test","password":"x","admission_number":""}"#;
        let dto: CreateStudentDto = serde_json::from_str(json).unwrap();
        let errors = dto.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("admission_number"));
    }
}
