//! Authentication: login with lockout, refresh token rotation, logout,
//! password changes and the per-request session check.

pub mod blacklist;
pub mod controller;
pub mod lockout;
pub mod router;
pub mod service;
