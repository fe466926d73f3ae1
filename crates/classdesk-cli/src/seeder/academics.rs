//! Session, subjects, classrooms and fee structures.

use std::error::Error;

use chrono::{Datelike, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use classdesk_models::ids::{ClassroomId, SessionId, SubjectId, UserId};

use super::models::SeedConfig;

const LEVELS: [&str; 6] = ["JSS 1", "JSS 2", "JSS 3", "SS 1", "SS 2", "SS 3"];

const SUBJECTS: [(&str, &str); 6] = [
    ("Mathematics", "MTH"),
    ("English Language", "ENG"),
    ("Basic Science", "BSC"),
    ("Social Studies", "SOS"),
    ("Computer Studies", "CMP"),
    ("Civic Education", "CVE"),
];

/// Tuition billed to each seeded classroom, in minor units.
const SEED_TUITION: i64 = 150_000;

/// `(level, section)` for the n-th seeded classroom: JSS 1A through SS 3A,
/// then JSS 1B and so on.
pub fn classroom_slot(n: usize) -> (&'static str, char) {
    let section = (b'A' + (n / LEVELS.len() % 26) as u8) as char;
    (LEVELS[n % LEVELS.len()], section)
}

fn date(year: i32, month: u32, day: u32) -> Result<NaiveDate, String> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| format!("invalid date {year}-{month}-{day}"))
}

/// Creates a current session with three terms unless one is already
/// current. Returns whether anything was created.
pub async fn seed_current_session(db: &PgPool) -> Result<bool, Box<dyn Error>> {
    let has_current = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM academic_sessions WHERE is_current)",
    )
    .fetch_one(db)
    .await?;
    if has_current {
        println!("📅 A current session exists, leaving it alone");
        return Ok(false);
    }

    let today = Utc::now().date_naive();
    let year = if today.month() >= 9 {
        today.year()
    } else {
        today.year() - 1
    };

    let terms = [
        ("First Term", date(year, 9, 1)?, date(year, 12, 15)?),
        ("Second Term", date(year + 1, 1, 6)?, date(year + 1, 4, 10)?),
        ("Third Term", date(year + 1, 4, 28)?, date(year + 1, 7, 31)?),
    ];

    let mut tx = db.begin().await?;

    let session_id = sqlx::query_scalar::<_, SessionId>(
        r#"INSERT INTO academic_sessions (name, start_date, end_date, is_current)
           VALUES ($1, $2, $3, TRUE)
           ON CONFLICT (name) DO UPDATE SET is_current = TRUE, updated_at = NOW()
           RETURNING id"#,
    )
    .bind(format!("{}/{}", year, year + 1))
    .bind(terms[0].1)
    .bind(terms[2].2)
    .fetch_one(&mut *tx)
    .await?;

    for (sequence, (name, start, end)) in terms.iter().enumerate() {
        let is_current = (*start..=*end).contains(&today) || (sequence == 0 && today < *start);
        sqlx::query(
            r#"INSERT INTO terms (session_id, name, sequence, start_date, end_date, is_current)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (session_id, sequence) DO NOTHING"#,
        )
        .bind(session_id)
        .bind(*name)
        .bind(sequence as i32 + 1)
        .bind(*start)
        .bind(*end)
        .bind(is_current)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    println!("📅 Created session {}/{} with three terms", year, year + 1);
    Ok(true)
}

pub async fn seed_subjects(db: &PgPool) -> Result<Vec<SubjectId>, Box<dyn Error>> {
    let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO subjects (name, code) ");
    builder.push_values(SUBJECTS, |mut row, (name, code)| {
        row.push_bind(name).push_bind(code);
    });
    builder.push(" ON CONFLICT (code) DO NOTHING");
    builder.build().execute(db).await?;

    let codes: Vec<&str> = SUBJECTS.iter().map(|(_, code)| *code).collect();
    let ids = sqlx::query_scalar::<_, SubjectId>(
        "SELECT id FROM subjects WHERE code = ANY($1) ORDER BY code",
    )
    .bind(codes)
    .fetch_all(db)
    .await?;

    println!("📚 {} subjects available", ids.len());
    Ok(ids)
}

/// Class teachers are taken round robin from `teachers`.
pub async fn seed_classrooms(
    db: &PgPool,
    config: &SeedConfig,
    teachers: &[UserId],
    run: &str,
) -> Result<Vec<ClassroomId>, Box<dyn Error>> {
    if config.classrooms == 0 {
        return Ok(Vec::new());
    }

    let capacity = config.students_per_classroom.max(40) as i32;
    let rows: Vec<(String, &str, String, Option<UserId>)> = (0..config.classrooms)
        .map(|n| {
            let (level, section) = classroom_slot(n);
            let teacher = (!teachers.is_empty()).then(|| teachers[n % teachers.len()]);
            (
                format!("{}{} {}", level, section, run),
                level,
                section.to_string(),
                teacher,
            )
        })
        .collect();

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO classrooms (name, level, section, capacity, class_teacher_id) ",
    );
    builder.push_values(&rows, |mut row, (name, level, section, teacher)| {
        row.push_bind(name)
            .push_bind(*level)
            .push_bind(section)
            .push_bind(capacity)
            .push_bind(*teacher);
    });
    builder.push(" RETURNING id");

    let ids = builder.build_query_scalar::<ClassroomId>().fetch_all(db).await?;
    println!("🏫 Created {} classrooms", ids.len());
    Ok(ids)
}

/// Offers every subject in every classroom; subject teachers rotate.
pub async fn assign_subjects(
    db: &PgPool,
    classroom_ids: &[ClassroomId],
    subject_ids: &[SubjectId],
    teachers: &[UserId],
) -> Result<(), Box<dyn Error>> {
    let pairs: Vec<(ClassroomId, SubjectId, Option<UserId>)> = classroom_ids
        .iter()
        .flat_map(|&classroom_id| subject_ids.iter().map(move |&subject_id| (classroom_id, subject_id)))
        .enumerate()
        .map(|(n, (classroom_id, subject_id))| {
            let teacher = (!teachers.is_empty()).then(|| teachers[n % teachers.len()]);
            (classroom_id, subject_id, teacher)
        })
        .collect();

    if pairs.is_empty() {
        return Ok(());
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO classroom_subjects (classroom_id, subject_id, teacher_id) ",
    );
    builder.push_values(&pairs, |mut row, (classroom_id, subject_id, teacher)| {
        row.push_bind(*classroom_id)
            .push_bind(*subject_id)
            .push_bind(*teacher);
    });
    builder.push(" ON CONFLICT (classroom_id, subject_id) DO NOTHING");
    builder.build().execute(db).await?;

    Ok(())
}

/// One active tuition structure per classroom. Students seeded afterwards
/// are billed by `sync-fees`.
pub async fn seed_fee_structures(
    db: &PgPool,
    classroom_ids: &[ClassroomId],
) -> Result<usize, Box<dyn Error>> {
    if classroom_ids.is_empty() {
        return Ok(0);
    }

    let mut builder =
        QueryBuilder::<Postgres>::new("INSERT INTO fee_structures (name, classroom_id, amount) ");
    builder.push_values(classroom_ids, |mut row, classroom_id| {
        row.push_bind("Tuition")
            .push_bind(*classroom_id)
            .push_bind(SEED_TUITION);
    });

    let created = builder.build().execute(db).await?.rows_affected() as usize;
    println!("💰 Created {} fee structures", created);
    Ok(created)
}

pub async fn clear_seeded_classrooms(db: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM classrooms WHERE name LIKE '% seed-%'")
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classroom_slots_cycle_levels_then_sections() {
        assert_eq!(classroom_slot(0), ("JSS 1", 'A'));
        assert_eq!(classroom_slot(5), ("SS 3", 'A'));
        assert_eq!(classroom_slot(6), ("JSS 1", 'B'));
        assert_eq!(classroom_slot(13), ("JSS 2", 'C'));
    }
}
