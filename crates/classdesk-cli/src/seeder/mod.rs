//! Fake school data for local development.
//!
//! Seeded accounts use `@example.com` addresses and seeded classrooms carry
//! the run tag in their name, so `clear_all` can find both again.

use std::error::Error;
use std::time::Instant;

use fake::{Fake, Faker};
use sqlx::PgPool;

use classdesk_core::hash_password;
use classdesk_models::users::UserRole;

pub mod academics;
pub mod models;
pub mod users;

pub use models::{SeedConfig, SeedSummary};

/// Password given to every seeded account.
pub const SEED_PASSWORD: &str = "Password123!";

/// Short tag that keeps names from different runs apart.
pub fn run_tag() -> String {
    let n: u16 = Faker.fake();
    format!("seed-{:04x}", n)
}

pub async fn seed_all(db: &PgPool, config: &SeedConfig) -> Result<SeedSummary, Box<dyn Error>> {
    let start_time = Instant::now();
    let run = run_tag();
    println!(
        "🌱 Seeding {} classrooms with {} students each (run {})",
        config.classrooms, config.students_per_classroom, run
    );

    let password_hash = hash_password(SEED_PASSWORD).map_err(|e| e.to_string())?;

    let session_created = academics::seed_current_session(db).await?;
    let subject_ids = academics::seed_subjects(db).await?;
    let teachers =
        users::seed_users(db, UserRole::Teacher, config.teachers, &run, &password_hash).await?;
    let parents =
        users::seed_users(db, UserRole::Parent, config.parents, &run, &password_hash).await?;
    let classroom_ids = academics::seed_classrooms(db, config, &teachers, &run).await?;
    academics::assign_subjects(db, &classroom_ids, &subject_ids, &teachers).await?;
    let fee_structures = academics::seed_fee_structures(db, &classroom_ids).await?;
    let students = users::seed_students(
        db,
        &classroom_ids,
        config.students_per_classroom,
        &parents,
        &run,
        &password_hash,
    )
    .await?;

    let summary = SeedSummary {
        run,
        session_created,
        subjects: subject_ids.len(),
        teachers: teachers.len(),
        parents: parents.len(),
        classrooms: classroom_ids.len(),
        fee_structures,
        students,
        elapsed: start_time.elapsed(),
    };

    println!("\n✅ {}", summary);
    Ok(summary)
}

/// Removes seeded accounts (students go with their user rows) and seeded
/// classrooms. Admin accounts are never touched.
pub async fn clear_all(db: &PgPool) -> Result<(u64, u64), Box<dyn Error>> {
    let start_time = Instant::now();
    println!("🗑️  Clearing seeded data...");

    let users = users::clear_seeded_users(db).await?;
    let classrooms = academics::clear_seeded_classrooms(db).await?;

    println!(
        "   ✓ Deleted {} users and {} classrooms in {:?}",
        users,
        classrooms,
        start_time.elapsed()
    );

    Ok((users, classrooms))
}
