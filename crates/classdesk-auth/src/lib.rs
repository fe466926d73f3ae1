//! # Classdesk Auth
//!
//! JWT claims and token utilities for the Classdesk API.
//!
//! - [`claims`]: access and refresh claim structures
//! - [`jwt`]: token creation and verification
//!
//! Tokens are HS256 signed with `JWT_SECRET`. Access tokens carry the
//! user's role; refresh tokens only identify the user and are rotated on
//! every use.

pub mod claims;
pub mod jwt;

pub use claims::{ACCESS_TOKEN_TYPE, Claims, REFRESH_TOKEN_TYPE, RefreshTokenClaims};
pub use jwt::{
    TokenPair, create_access_token, create_refresh_token, create_token_pair, subject_id,
    timestamp_to_datetime, verify_refresh_token, verify_token,
};
