//! # Classdesk Models
//!
//! Domain models and DTOs for the Classdesk API: database rows
//! (`sqlx::FromRow`), request bodies (`validator::Validate`) and the
//! OpenAPI schemas for both (`utoipa::ToSchema`).
//!
//! # Modules
//!
//! - [`ids`]: typed UUID wrappers for every entity
//! - [`value_types`]: normalized email and fee PIN
//! - [`users`], [`auth`]: accounts, roles and authentication bodies
//! - [`students`], [`classrooms`], [`subjects`]
//! - [`academic_sessions`], [`terms`]
//! - [`attendance`], [`timetables`]
//! - [`fees`]: structures, student fees, payments, sync reports
//! - [`results`]: scores, grading and report cards
//! - [`audit`], [`portal`]

pub mod academic_sessions;
pub mod attendance;
pub mod audit;
pub mod auth;
pub mod classrooms;
pub mod fees;
pub mod ids;
pub mod portal;
pub mod results;
pub mod students;
pub mod subjects;
pub mod terms;
pub mod timetables;
pub mod users;
pub mod validation;
pub mod value_types;

pub use auth::{
    ChangePasswordRequest, CsrfTokenResponse, LoginRequest, LoginResponse, LogoutRequest,
    MessageResponse, RefreshTokenRequest, TokenResponse,
};
pub use users::{CreateUserDto, UpdateUserDto, User, UserCredentials, UserFilterParams, UserRole};
pub use value_types::{Email, FeePin, ValueTypeError};
