//! HTTP audit trail.
//!
//! Successful mutating requests under `/api` are recorded after the handler
//! has run. The action is `<entity>.<verb>` where the entity is the first
//! path segment after `/api` and the verb follows from the method.

use axum::{
    extract::{Request, State},
    http::{Method, header},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use classdesk_auth::{subject_id, verify_token};
use classdesk_models::audit::NewAuditLog;
use classdesk_models::ids::UserId;

use crate::middleware::auth::bearer_token;
use crate::middleware::rate_limit::{client_ip, peer_addr};
use crate::modules::audit_logs::service::AuditService;
use crate::state::AppState;

pub fn verb_for(method: &Method) -> Option<&'static str> {
    match *method {
        Method::POST => Some("create"),
        Method::PUT | Method::PATCH => Some("update"),
        Method::DELETE => Some("delete"),
        _ => None,
    }
}

/// Splits `/api/<entity>/...` into the entity type and the first UUID
/// segment, if any.
pub fn parse_audit_path(path: &str) -> Option<(String, Option<Uuid>)> {
    let rest = path.strip_prefix("/api/")?;
    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let entity_type = segments.next()?.to_string();
    let entity_id = segments.find_map(|segment| Uuid::parse_str(segment).ok());
    Some((entity_type, entity_id))
}

pub fn http_audit_entry(
    method: &Method,
    path: &str,
    status: u16,
    actor_id: Option<UserId>,
) -> Option<NewAuditLog> {
    let verb = verb_for(method)?;
    let (entity_type, entity_id) = parse_audit_path(path)?;

    Some(NewAuditLog {
        actor_id,
        action: format!("{}.{}", entity_type, verb),
        entity_type,
        entity_id,
        method: Some(method.to_string()),
        path: Some(path.to_string()),
        status_code: Some(i32::from(status)),
        ..Default::default()
    })
}

pub async fn audit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if verb_for(req.method()).is_none() {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let ip_address = client_ip(req.headers(), peer_addr(&req));
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let actor_id = bearer_token(req.headers())
        .ok()
        .and_then(|token| verify_token(token, &state.jwt_config).ok())
        .and_then(|claims| subject_id(&claims.sub).ok())
        .map(UserId::from);

    let response = next.run(req).await;

    if response.status().is_success() {
        if let Some(mut entry) =
            http_audit_entry(&method, &path, response.status().as_u16(), actor_id)
        {
            entry.ip_address = Some(ip_address);
            entry.user_agent = user_agent;
            AuditService::spawn_record(&state.db, entry);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbs() {
        assert_eq!(verb_for(&Method::POST), Some("create"));
        assert_eq!(verb_for(&Method::PATCH), Some("update"));
        assert_eq!(verb_for(&Method::DELETE), Some("delete"));
        assert_eq!(verb_for(&Method::GET), None);
    }

    #[test]
    fn test_path_with_id() {
        let id = Uuid::new_v4();
        let (entity, entity_id) = parse_audit_path(&format!("/api/students/{}/parent", id)).unwrap();
        assert_eq!(entity, "students");
        assert_eq!(entity_id, Some(id));
    }

    #[test]
    fn test_path_without_id() {
        let (entity, entity_id) = parse_audit_path("/api/attendance/bulk").unwrap();
        assert_eq!(entity, "attendance");
        assert!(entity_id.is_none());
    }

    #[test]
    fn test_non_api_paths_are_ignored() {
        assert!(parse_audit_path("/health").is_none());
        assert!(parse_audit_path("/api/").is_none());
    }

    #[test]
    fn test_entry_from_request() {
        let actor = UserId::new();
        let id = Uuid::new_v4();
        let entry = http_audit_entry(
            &Method::PUT,
            &format!("/api/classrooms/{}", id),
            200,
            Some(actor),
        )
        .unwrap();

        assert_eq!(entry.action, "classrooms.update");
        assert_eq!(entry.entity_type, "classrooms");
        assert_eq!(entry.entity_id, Some(id));
        assert_eq!(entry.actor_id, Some(actor));
        assert_eq!(entry.method.as_deref(), Some("PUT"));
        assert_eq!(entry.status_code, Some(200));
    }

    #[test]
    fn test_reads_produce_no_entry() {
        assert!(http_audit_entry(&Method::GET, "/api/students", 200, None).is_none());
    }
}
