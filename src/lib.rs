//! # ClassDesk API
//!
//! School management backend built on Axum and PostgreSQL.
//!
//! ## Layout
//!
//! ```text
//! src/
//! ├── middleware/       # Auth extractor, role guards, rate limit, CSRF, audit
//! ├── modules/          # Feature modules
//! │   ├── auth/         # Login, refresh rotation, logout, lockout
//! │   ├── users/        # Account administration
//! │   ├── students/     # Enrollment, placement, parent links
//! │   ├── classrooms/   # Classrooms and subject assignments
//! │   ├── subjects/
//! │   ├── academic_sessions/
//! │   ├── terms/
//! │   ├── attendance/   # Daily registers and summaries
//! │   ├── timetables/   # Weekly periods with clash detection
//! │   ├── fees/         # Structures, payments, PIN lookup, fee sync
//! │   ├── results/      # Scores, grades, report cards
//! │   ├── audit_logs/
//! │   ├── portal/       # Admin, teacher, student and parent views
//! │   └── health/
//! ├── docs.rs           # OpenAPI document
//! ├── logging.rs        # Subscriber setup and request logging
//! ├── metrics.rs        # Prometheus recorder and counters
//! ├── router.rs         # Route groups and global layers
//! └── state.rs
//! ```
//!
//! Each feature module has a `controller.rs` (handlers with OpenAPI
//! annotations), a `service.rs` (queries and business rules) and a
//! `router.rs`. Types shared with the CLI live in `classdesk-models`.
//!
//! ## Roles
//!
//! | Role    | Reaches |
//! |---------|---------|
//! | admin   | everything |
//! | teacher | students, classrooms, attendance, timetables, results, teacher portal |
//! | parent  | parent portal, for linked children only |
//! | student | student portal, for their own record only |
//!
//! Admins are bootstrapped with `classdesk-cli create-admin`.

pub mod docs;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod modules;
pub mod router;
pub mod state;
pub mod validator;

pub use classdesk_auth;
pub use classdesk_config;
pub use classdesk_core;
pub use classdesk_db;
pub use classdesk_models;
