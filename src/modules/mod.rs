pub mod academic_sessions;
pub mod attendance;
pub mod audit_logs;
pub mod auth;
pub mod classrooms;
pub mod fees;
pub mod health;
pub mod portal;
pub mod results;
pub mod students;
pub mod subjects;
pub mod terms;
pub mod timetables;
pub mod users;
