//! Account administration for every role.

pub mod controller;
pub mod router;
pub mod service;
