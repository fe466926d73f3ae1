//! Account and student seeding.

use std::error::Error;
use std::time::Instant;

use chrono::NaiveDate;
use fake::Fake;
use fake::faker::name::en::{FirstName, LastName};
use rayon::prelude::*;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use classdesk_models::ids::{ClassroomId, UserId};
use classdesk_models::students::Gender;
use classdesk_models::users::UserRole;

use super::models::{StudentSeed, UserSeed};

/// Rows per multi-row INSERT, well under the bind parameter limit.
const BATCH_SIZE: usize = 1000;

pub fn generate_users(
    role: UserRole,
    count: usize,
    run: &str,
    password_hash: &str,
) -> Vec<UserSeed> {
    (0..count)
        .into_par_iter()
        .map(|idx| generate_user(role, run, idx, password_hash))
        .collect()
}

fn generate_user(role: UserRole, run: &str, idx: usize, password_hash: &str) -> UserSeed {
    let first_name: String = FirstName().fake();
    let last_name: String = LastName().fake();

    UserSeed {
        email: seed_email(&first_name, &last_name, role, run, idx),
        first_name,
        last_name,
        password_hash: password_hash.to_string(),
        role,
    }
}

/// `first.last+<role><idx>.<run>@example.com`, lowercased with anything
/// outside `[a-z0-9]` dropped from the name parts.
pub fn seed_email(first: &str, last: &str, role: UserRole, run: &str, idx: usize) -> String {
    let clean = |s: &str| {
        s.chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_lowercase()
    };
    format!(
        "{}.{}+{}{}.{}@example.com",
        clean(first),
        clean(last),
        role.as_str(),
        idx,
        run
    )
}

/// Students spread over the classrooms, with parents assigned round robin.
pub fn generate_students(
    classroom_ids: &[ClassroomId],
    per_classroom: usize,
    parents: &[UserId],
    run: &str,
    password_hash: &str,
) -> Vec<StudentSeed> {
    classroom_ids
        .par_iter()
        .enumerate()
        .flat_map(|(class_idx, &classroom_id)| {
            (0..per_classroom)
                .map(|n| {
                    let idx = class_idx * per_classroom + n;
                    StudentSeed {
                        user: generate_user(UserRole::Student, run, idx, password_hash),
                        admission_number: format!("{}/{:05}", run.to_uppercase(), idx + 1),
                        classroom_id,
                        parent_id: (!parents.is_empty()).then(|| parents[idx % parents.len()]),
                        date_of_birth: NaiveDate::from_ymd_opt(
                            2008 + (idx % 8) as i32,
                            1 + (idx % 12) as u32,
                            1 + (idx % 28) as u32,
                        ),
                        gender: if idx % 2 == 0 {
                            Gender::Female
                        } else {
                            Gender::Male
                        },
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

pub async fn seed_users(
    db: &PgPool,
    role: UserRole,
    count: usize,
    run: &str,
    password_hash: &str,
) -> Result<Vec<UserId>, Box<dyn Error>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let start_time = Instant::now();
    println!("👥 Seeding {} {} accounts...", count, role.as_str());

    let users = generate_users(role, count, run, password_hash);

    let mut tx = db.begin().await?;
    let mut ids = Vec::with_capacity(users.len());
    for chunk in users.chunks(BATCH_SIZE) {
        ids.extend(insert_users_chunk(&mut tx, chunk).await?);
    }
    tx.commit().await?;

    println!("   ✓ Inserted {} accounts in {:?}", ids.len(), start_time.elapsed());
    Ok(ids)
}

pub async fn seed_students(
    db: &PgPool,
    classroom_ids: &[ClassroomId],
    per_classroom: usize,
    parents: &[UserId],
    run: &str,
    password_hash: &str,
) -> Result<usize, Box<dyn Error>> {
    let start_time = Instant::now();
    let students = generate_students(classroom_ids, per_classroom, parents, run, password_hash);
    println!("🎒 Seeding {} students...", students.len());

    let mut tx = db.begin().await?;
    for chunk in students.chunks(BATCH_SIZE) {
        let users: Vec<&UserSeed> = chunk.iter().map(|s| &s.user).collect();
        let user_ids = insert_user_refs(&mut tx, &users).await?;

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO students (user_id, admission_number, classroom_id, parent_id, date_of_birth, gender) ",
        );
        builder.push_values(user_ids.iter().zip(chunk), |mut row, (user_id, student)| {
            row.push_bind(*user_id)
                .push_bind(&student.admission_number)
                .push_bind(student.classroom_id)
                .push_bind(student.parent_id)
                .push_bind(student.date_of_birth)
                .push_bind(student.gender);
        });
        builder.build().execute(&mut *tx).await?;
    }
    tx.commit().await?;

    println!(
        "   ✓ Inserted {} students in {:?}",
        students.len(),
        start_time.elapsed()
    );
    Ok(students.len())
}

async fn insert_users_chunk(
    conn: &mut PgConnection,
    users: &[UserSeed],
) -> Result<Vec<UserId>, sqlx::Error> {
    let refs: Vec<&UserSeed> = users.iter().collect();
    insert_user_refs(conn, &refs).await
}

/// Multi-row insert; ids come back in VALUES order.
async fn insert_user_refs(
    conn: &mut PgConnection,
    users: &[&UserSeed],
) -> Result<Vec<UserId>, sqlx::Error> {
    if users.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder =
        QueryBuilder::<Postgres>::new("INSERT INTO users (first_name, last_name, email, password, role) ");
    builder.push_values(users, |mut row, user| {
        row.push_bind(&user.first_name)
            .push_bind(&user.last_name)
            .push_bind(&user.email)
            .push_bind(&user.password_hash)
            .push_bind(user.role);
    });
    builder.push(" RETURNING id");

    builder.build_query_scalar::<UserId>().fetch_all(conn).await
}

/// Deletes seeded non-admin accounts. Student rows cascade.
pub async fn clear_seeded_users(db: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM users WHERE email LIKE '%@example.com' AND role <> 'admin'",
    )
    .execute(db)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_email_is_lowercase_ascii() {
        let email = seed_email("Zoë", "O'Brien", UserRole::Teacher, "seed-00ff", 7);
        assert_eq!(email, "zo.obrien+teacher7.seed-00ff@example.com");
    }

    #[test]
    fn test_students_fill_each_classroom() {
        let classrooms = vec![ClassroomId::new(), ClassroomId::new()];
        let parents = vec![UserId::new(), UserId::new(), UserId::new()];

        let students = generate_students(&classrooms, 4, &parents, "seed-0001", "hash");

        assert_eq!(students.len(), 8);
        assert_eq!(
            students
                .iter()
                .filter(|s| s.classroom_id == classrooms[1])
                .count(),
            4
        );
        assert!(students.iter().all(|s| s.parent_id.is_some()));
        assert_eq!(students[0].admission_number, "SEED-0001/00001");
    }

    #[test]
    fn test_students_without_parents() {
        let students = generate_students(&[ClassroomId::new()], 2, &[], "seed-0001", "hash");
        assert!(students.iter().all(|s| s.parent_id.is_none()));
    }
}
