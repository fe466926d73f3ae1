use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable as _};
use utoipa_swagger_ui::SwaggerUi;

use classdesk_config::CorsConfig;
use classdesk_config::security::CSRF_HEADER_NAME;

use crate::docs::ApiDoc;
use crate::logging::logging_middleware;
use crate::metrics::metrics_middleware;
use crate::middleware::audit::audit_middleware;
use crate::middleware::csrf::csrf_middleware;
use crate::middleware::rate_limit::rate_limit_middleware;
use crate::middleware::role::{
    require_admin, require_authenticated, require_parent, require_staff, require_student,
    require_teacher,
};
use crate::modules::academic_sessions::router::init_academic_sessions_router;
use crate::modules::attendance::router::init_attendance_router;
use crate::modules::audit_logs::router::init_audit_logs_router;
use crate::modules::auth::router::init_auth_router;
use crate::modules::classrooms::router::init_classrooms_router;
use crate::modules::fees::router::init_fees_router;
use crate::modules::health::router::init_health_router;
use crate::modules::portal::router::{
    init_admin_portal_router, init_parent_portal_router, init_student_portal_router,
    init_teacher_portal_router,
};
use crate::modules::results::router::init_results_router;
use crate::modules::students::router::init_students_router;
use crate::modules::subjects::router::init_subjects_router;
use crate::modules::terms::router::init_terms_router;
use crate::modules::timetables::router::init_timetables_router;
use crate::modules::users::router::init_users_router;
use crate::state::AppState;

/// Role groups:
/// - admin: users, fees, audit logs, admin portal
/// - staff (admin, teacher): students, classrooms, subjects, attendance,
///   timetables, results; admin-only writes use `RequireAdmin`
/// - any signed-in user: sessions and terms reads
/// - one role each: teacher, student and parent portals
pub fn init_router(state: AppState) -> Router {
    macro_rules! guarded {
        ($router:expr, $guard:expr) => {
            $router.route_layer(middleware::from_fn_with_state(state.clone(), $guard))
        };
    }

    let portal = Router::new()
        .nest("/admin", guarded!(init_admin_portal_router(), require_admin))
        .nest("/teacher", guarded!(init_teacher_portal_router(), require_teacher))
        .nest("/student", guarded!(init_student_portal_router(), require_student))
        .nest("/parent", guarded!(init_parent_portal_router(), require_parent));

    let api = Router::new()
        .nest("/auth", init_auth_router())
        .nest("/users", guarded!(init_users_router(), require_admin))
        .nest("/students", guarded!(init_students_router(), require_staff))
        .nest("/classrooms", guarded!(init_classrooms_router(), require_staff))
        .nest("/subjects", guarded!(init_subjects_router(), require_staff))
        .nest(
            "/sessions",
            guarded!(init_academic_sessions_router(), require_authenticated),
        )
        .nest("/terms", guarded!(init_terms_router(), require_authenticated))
        .nest("/attendance", guarded!(init_attendance_router(), require_staff))
        .nest("/timetables", guarded!(init_timetables_router(), require_staff))
        .nest("/fees", guarded!(init_fees_router(), require_admin))
        .nest("/results", guarded!(init_results_router(), require_staff))
        .nest("/audit-logs", guarded!(init_audit_logs_router(), require_admin))
        .nest("/portal", portal);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(Scalar::with_url("/scalar", ApiDoc::openapi()))
        .merge(init_health_router())
        .nest("/api", api)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), csrf_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .layer(cors_layer(&state.cors_config))
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(CSRF_HEADER_NAME),
        ])
        .allow_credentials(true)
}
