//! Classrooms and their subject assignments.

use chrono::{DateTime, Utc};
use classdesk_core::serde::{
    deserialize_nullable, deserialize_optional_bool, deserialize_optional_string,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::{ClassroomId, SubjectId, UserId};
use crate::validation::not_blank;

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct Classroom {
    pub id: ClassroomId,
    pub name: String,
    /// Grade or year group, e.g. `JSS 1`
    pub level: String,
    pub section: Option<String>,
    pub capacity: i32,
    pub class_teacher_id: Option<UserId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct ClassroomWithStats {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub classroom: Classroom,
    pub student_count: i64,
}

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct CreateClassroomDto {
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub level: String,
    #[validate(length(max = 20))]
    pub section: Option<String>,
    #[validate(range(min = 1, max = 1000, message = "Capacity must be between 1 and 1000"))]
    pub capacity: i32,
    pub class_teacher_id: Option<UserId>,
}

#[derive(Deserialize, Debug, Clone, Default, Validate, ToSchema)]
pub struct UpdateClassroomDto {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub level: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    #[schema(value_type = Option<String>)]
    #[validate(length(max = 20))]
    pub section: Option<Option<String>>,
    #[validate(range(min = 1, max = 1000, message = "Capacity must be between 1 and 1000"))]
    pub capacity: Option<i32>,
    /// `null` unassigns the class teacher
    #[serde(default, deserialize_with = "deserialize_nullable")]
    #[schema(value_type = Option<UserId>)]
    pub class_teacher_id: Option<Option<UserId>>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClassroomFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub level: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
}

/// A subject taught in a classroom, with the assigned teacher if any.
#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct ClassroomSubject {
    pub classroom_id: ClassroomId,
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub subject_code: String,
    pub teacher_id: Option<UserId>,
    pub teacher_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct AssignSubjectDto {
    pub subject_id: SubjectId,
    pub teacher_id: Option<UserId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_must_be_positive() {
        let dto = CreateClassroomDto {
            name: "JSS 1A".into(),
            level: "JSS 1".into(),
            section: Some("A".into()),
            capacity: 0,
            class_teacher_id: None,
        };
        let errors = dto.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("capacity"));
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let dto = CreateClassroomDto {
            name: "   ".into(),
            level: "JSS 1".into(),
            section: None,
            capacity: 30,
            class_teacher_id: None,
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_stats_serialize_flat() {
        let now = Utc::now();
        let stats = ClassroomWithStats {
            classroom: Classroom {
                id: ClassroomId::new(),
                name: "Primary 4".into(),
                level: "Primary 4".into(),
                section: None,
                capacity: 35,
                class_teacher_id: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            },
            student_count: 12,
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["name"], "Primary 4");
        assert_eq!(value["student_count"], 12);
    }
}
