//! Audit trail: persistence, the admin listing endpoint and the service
//! used by other modules to record explicit events.

pub mod controller;
pub mod router;
pub mod service;
