//! # ClassDesk Core
//!
//! Core types, errors, and utilities for the ClassDesk API.
//!
//! - [`errors`]: Application error type with HTTP response conversion
//! - [`pagination`]: Pagination parameters and paginated responses
//! - [`password`]: Password hashing, verification and the password policy
//! - [`serde`]: Query-string friendly deserialization helpers
//!
//! # Example
//!
//! ```ignore
//! use classdesk_core::{AppError, PasswordPolicy, hash_password};
//!
//! PasswordPolicy::default().enforce(&dto.password)?;
//! let hash = hash_password(&dto.password)?;
//!
//! let error = AppError::not_found(anyhow::anyhow!("Student not found"));
//! ```

pub mod errors;
pub mod pagination;
pub mod password;
pub mod serde;

// Re-export commonly used types at crate root
pub use errors::AppError;
pub use pagination::{Paginated, PaginationMeta, PaginationParams};
pub use password::{PasswordPolicy, hash_password, verify_password};
