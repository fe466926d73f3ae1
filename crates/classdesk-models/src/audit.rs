//! Audit trail entries.

use chrono::{DateTime, Utc};
use classdesk_core::serde::deserialize_optional_string;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::ids::{AuditLogId, UserId};

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub actor_id: Option<UserId>,
    /// `<entity>.<verb>`, e.g. `students.create` or `auth.login_failed`
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub status_code: Option<i32>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// An audit entry about to be written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewAuditLog {
    pub actor_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub status_code: Option<i32>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl NewAuditLog {
    pub fn event(action: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            entity_type: entity_type.into(),
            ..Default::default()
        }
    }

    pub fn actor(mut self, actor_id: UserId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn entity(mut self, entity_id: impl Into<Uuid>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Deserialize, Debug, Clone, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogFilterParams {
    pub actor_id: Option<UserId>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string")]
    pub entity_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_builder() {
        let actor = UserId::new();
        let log = NewAuditLog::event("auth.login_failed", "auth")
            .actor(actor)
            .ip(Some("10.0.0.1".into()))
            .details(json!({ "attempts": 3 }));

        assert_eq!(log.actor_id, Some(actor));
        assert_eq!(log.action, "auth.login_failed");
        assert_eq!(log.details.unwrap()["attempts"], 3);
        assert!(log.path.is_none());
    }
}
