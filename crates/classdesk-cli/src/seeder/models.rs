//! Seed rows and run configuration.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;

use classdesk_models::ids::{ClassroomId, UserId};
use classdesk_models::students::Gender;
use classdesk_models::users::UserRole;

/// Seed data for a login account.
pub struct UserSeed {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

/// Seed data for a student; the account is inserted first.
pub struct StudentSeed {
    pub user: UserSeed,
    pub admission_number: String,
    pub classroom_id: ClassroomId,
    pub parent_id: Option<UserId>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Gender,
}

#[derive(Clone, Debug)]
pub struct SeedConfig {
    pub classrooms: usize,
    pub students_per_classroom: usize,
    pub teachers: usize,
    pub parents: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            classrooms: 6,
            students_per_classroom: 25,
            teachers: 8,
            parents: 40,
        }
    }
}

impl SeedConfig {
    pub fn new(classrooms: usize) -> Self {
        Self {
            classrooms,
            ..Default::default()
        }
    }

    pub fn with_students(mut self, per_classroom: usize) -> Self {
        self.students_per_classroom = per_classroom;
        self
    }

    pub fn with_teachers(mut self, teachers: usize) -> Self {
        self.teachers = teachers;
        self
    }

    pub fn with_parents(mut self, parents: usize) -> Self {
        self.parents = parents;
        self
    }

    pub fn total_students(&self) -> usize {
        self.classrooms * self.students_per_classroom
    }
}

#[derive(Debug)]
pub struct SeedSummary {
    pub run: String,
    pub session_created: bool,
    pub subjects: usize,
    pub teachers: usize,
    pub parents: usize,
    pub classrooms: usize,
    pub fee_structures: usize,
    pub students: usize,
    pub elapsed: Duration,
}

impl fmt::Display for SeedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Seeded {} classrooms, {} students, {} teachers, {} parents, {} subjects and {} fee structures in {:?}",
            self.classrooms,
            self.students,
            self.teachers,
            self.parents,
            self.subjects,
            self.fee_structures,
            self.elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = SeedConfig::new(4).with_students(30).with_teachers(3).with_parents(10);

        assert_eq!(config.classrooms, 4);
        assert_eq!(config.teachers, 3);
        assert_eq!(config.parents, 10);
        assert_eq!(config.total_students(), 120);
    }
}
