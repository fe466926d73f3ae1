//! Subjects offered by the school.

use chrono::{DateTime, Utc};
use classdesk_core::serde::{
    deserialize_nullable, deserialize_optional_bool, deserialize_optional_string,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::SubjectId;

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    /// Uppercase, unique. e.g. `MTH101`
    pub code: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct CreateSubjectDto {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 2, max = 20, message = "Code must be 2 to 20 characters"))]
    pub code: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, Validate, ToSchema)]
pub struct UpdateSubjectDto {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 2, max = 20, message = "Code must be 2 to 20 characters"))]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubjectFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub is_active: Option<bool>,
}

/// Subject codes are compared and stored uppercase.
pub fn normalize_subject_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_subject_code() {
        assert_eq!(normalize_subject_code(" mth101 "), "MTH101");
    }

    #[test]
    fn test_code_length() {
        let dto = CreateSubjectDto {
            name: "Mathematics".into(),
            code: "M".into(),
            description: None,
        };
        assert!(dto.validate().is_err());
    }
}
