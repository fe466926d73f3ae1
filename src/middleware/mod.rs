//! Request middleware and extractors.
//!
//! - [`auth`]: the `AuthUser` extractor (token + session validation)
//! - [`role`]: role-gated route groups and the `RequireAdmin` extractor
//! - [`rate_limit`]: per-client token buckets
//! - [`csrf`]: double-submit cookie check for unsafe methods
//! - [`audit`]: records successful mutating requests
//!
//! Global layers run in this order on the way in: CORS, request logging,
//! metrics, rate limiting, CSRF, audit. Role checks are attached per route
//! group in [`crate::router`].

pub mod audit;
pub mod auth;
pub mod csrf;
pub mod rate_limit;
pub mod role;
