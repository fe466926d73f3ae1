//! Read models for the role portals.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ids::ClassroomId;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct AdminDashboard {
    pub students: i64,
    pub teachers: i64,
    pub parents: i64,
    pub classrooms: i64,
    /// Sum of unpaid balances, in minor units
    pub outstanding_fees: i64,
    pub attendance_marked_today: i64,
    /// Ratio in `0.0..=1.0`
    pub attendance_rate_today: f64,
}

/// A classroom a teacher is responsible for, either as class teacher or
/// through subject assignments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct TeacherClass {
    pub classroom_id: ClassroomId,
    pub classroom_name: String,
    pub level: String,
    pub is_class_teacher: bool,
    pub subjects: Vec<String>,
}
