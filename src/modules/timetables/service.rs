use anyhow::anyhow;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument};

use classdesk_core::AppError;
use classdesk_models::ids::{TimetableEntryId, UserId};
use classdesk_models::timetables::{
    CreateTimetableEntryDto, Slot, TimetableEntry, TimetableEntryDetails, TimetableFilterParams,
    UpdateTimetableEntryDto,
};
use classdesk_models::users::UserRole;

use crate::modules::classrooms::service::ClassroomService;
use crate::modules::users::service::UserService;

const ENTRY_COLUMNS: &str = "t.id, t.classroom_id, t.subject_id, t.teacher_id, t.day_of_week, \
     t.start_time, t.end_time, t.room, t.created_at, t.updated_at";

pub struct TimetableService;

impl TimetableService {
    #[instrument(skip(db, dto), fields(classroom_id = %dto.classroom_id, day = dto.day_of_week))]
    pub async fn create_entry(
        db: &PgPool,
        dto: CreateTimetableEntryDto,
    ) -> Result<TimetableEntry, AppError> {
        ClassroomService::ensure_exists(db, dto.classroom_id).await?;
        if let Some(teacher_id) = dto.teacher_id {
            UserService::ensure_role(db, teacher_id, UserRole::Teacher).await?;
        }

        let slot = Slot {
            classroom_id: dto.classroom_id,
            teacher_id: dto.teacher_id,
            day_of_week: dto.day_of_week,
            start_time: dto.start_time,
            end_time: dto.end_time,
        };
        ensure_no_clash(db, &slot, None).await?;

        let entry = sqlx::query_as::<_, TimetableEntry>(
            r#"INSERT INTO timetable_entries
                (classroom_id, subject_id, teacher_id, day_of_week, start_time, end_time, room)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, classroom_id, subject_id, teacher_id, day_of_week, start_time,
                         end_time, room, created_at, updated_at"#,
        )
        .bind(dto.classroom_id)
        .bind(dto.subject_id)
        .bind(dto.teacher_id)
        .bind(dto.day_of_week)
        .bind(dto.start_time)
        .bind(dto.end_time)
        .bind(&dto.room)
        .fetch_one(db)
        .await?;

        info!(entry_id = %entry.id, "Timetable entry created");
        Ok(entry)
    }

    #[instrument(skip(db))]
    pub async fn get_entries(
        db: &PgPool,
        filters: &TimetableFilterParams,
    ) -> Result<Vec<TimetableEntryDetails>, AppError> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            r#"SELECT {ENTRY_COLUMNS},
                      c.name AS classroom_name,
                      sub.name AS subject_name,
                      CASE WHEN u.id IS NULL THEN NULL ELSE u.first_name || ' ' || u.last_name END AS teacher_name
               FROM timetable_entries t
               JOIN classrooms c ON c.id = t.classroom_id
               JOIN subjects sub ON sub.id = t.subject_id
               LEFT JOIN users u ON u.id = t.teacher_id
               WHERE 1=1"#
        ));

        if let Some(classroom_id) = filters.classroom_id {
            query.push(" AND t.classroom_id = ");
            query.push_bind(classroom_id);
        }
        if let Some(teacher_id) = filters.teacher_id {
            query.push(" AND t.teacher_id = ");
            query.push_bind(teacher_id);
        }
        if let Some(day) = filters.day_of_week {
            query.push(" AND t.day_of_week = ");
            query.push_bind(day);
        }
        query.push(" ORDER BY t.day_of_week, t.start_time, c.name");

        let entries = query
            .build_query_as::<TimetableEntryDetails>()
            .fetch_all(db)
            .await?;

        Ok(entries)
    }

    #[instrument(skip(db))]
    pub async fn get_entry(db: &PgPool, id: TimetableEntryId) -> Result<TimetableEntry, AppError> {
        sqlx::query_as::<_, TimetableEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM timetable_entries t WHERE t.id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Timetable entry not found")))
    }

    #[instrument(skip(db, dto))]
    pub async fn update_entry(
        db: &PgPool,
        id: TimetableEntryId,
        dto: UpdateTimetableEntryDto,
    ) -> Result<TimetableEntry, AppError> {
        let current = Self::get_entry(db, id).await?;

        let teacher_id = dto.teacher_id.unwrap_or(current.teacher_id);
        if let Some(Some(teacher_id)) = dto.teacher_id {
            UserService::ensure_role(db, teacher_id, UserRole::Teacher).await?;
        }

        let slot = Slot {
            classroom_id: current.classroom_id,
            teacher_id,
            day_of_week: dto.day_of_week.unwrap_or(current.day_of_week),
            start_time: dto.start_time.unwrap_or(current.start_time),
            end_time: dto.end_time.unwrap_or(current.end_time),
        };
        if slot.start_time >= slot.end_time {
            return Err(AppError::bad_request(anyhow!(
                "Start time must be before end time"
            )));
        }
        ensure_no_clash(db, &slot, Some(id)).await?;

        let entry = sqlx::query_as::<_, TimetableEntry>(
            r#"UPDATE timetable_entries
               SET subject_id = COALESCE($2, subject_id),
                   teacher_id = $3,
                   day_of_week = $4,
                   start_time = $5,
                   end_time = $6,
                   room = CASE WHEN $8 THEN $7 ELSE room END,
                   updated_at = NOW()
               WHERE id = $1
               RETURNING id, classroom_id, subject_id, teacher_id, day_of_week, start_time,
                         end_time, room, created_at, updated_at"#,
        )
        .bind(id)
        .bind(dto.subject_id)
        .bind(slot.teacher_id)
        .bind(slot.day_of_week)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .bind(dto.room.as_ref().and_then(Option::as_deref))
        .bind(dto.room.is_some())
        .fetch_one(db)
        .await?;

        Ok(entry)
    }

    #[instrument(skip(db))]
    pub async fn delete_entry(db: &PgPool, id: TimetableEntryId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM timetable_entries WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Timetable entry not found")));
        }

        Ok(())
    }

    /// Entries taught by `teacher_id`, across classrooms.
    pub async fn get_teacher_entries(
        db: &PgPool,
        teacher_id: UserId,
    ) -> Result<Vec<TimetableEntryDetails>, AppError> {
        let filters = TimetableFilterParams {
            teacher_id: Some(teacher_id),
            ..Default::default()
        };
        Self::get_entries(db, &filters).await
    }
}

/// Loads the entries that could clash with `slot` (same day, same
/// classroom or teacher) and rejects the first real overlap.
async fn ensure_no_clash(
    db: &PgPool,
    slot: &Slot,
    exclude: Option<TimetableEntryId>,
) -> Result<(), AppError> {
    let candidates = sqlx::query_as::<_, TimetableEntry>(&format!(
        r#"SELECT {ENTRY_COLUMNS}
           FROM timetable_entries t
           WHERE t.day_of_week = $1
             AND (t.classroom_id = $2 OR ($3::uuid IS NOT NULL AND t.teacher_id = $3))
             AND ($4::uuid IS NULL OR t.id <> $4)"#
    ))
    .bind(slot.day_of_week)
    .bind(slot.classroom_id)
    .bind(slot.teacher_id)
    .bind(exclude)
    .fetch_all(db)
    .await?;

    match find_clash(slot, &candidates) {
        Some(clash) => Err(AppError::conflict(anyhow!(
            "Timetable clash with entry {} ({} to {})",
            clash.id,
            clash.start_time.format("%H:%M"),
            clash.end_time.format("%H:%M")
        ))),
        None => Ok(()),
    }
}

pub fn find_clash<'a>(slot: &Slot, entries: &'a [TimetableEntry]) -> Option<&'a TimetableEntry> {
    entries
        .iter()
        .find(|entry| slot.clashes_with(&Slot::from(*entry)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};
    use classdesk_models::ids::{ClassroomId, SubjectId};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entry(classroom: ClassroomId, teacher: Option<UserId>, start: NaiveTime, end: NaiveTime) -> TimetableEntry {
        TimetableEntry {
            id: TimetableEntryId::new(),
            classroom_id: classroom,
            subject_id: SubjectId::new(),
            teacher_id: teacher,
            day_of_week: 2,
            start_time: start,
            end_time: end,
            room: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_find_clash_returns_overlapping_entry() {
        let room = ClassroomId::new();
        let first = entry(room, None, t(8, 0), t(8, 40));
        let second = entry(room, None, t(9, 0), t(9, 40));
        let entries = vec![first, second.clone()];

        let slot = Slot {
            classroom_id: room,
            teacher_id: None,
            day_of_week: 2,
            start_time: t(9, 20),
            end_time: t(10, 0),
        };

        assert_eq!(find_clash(&slot, &entries).map(|e| e.id), Some(second.id));
    }

    #[test]
    fn test_find_clash_none_when_free() {
        let room = ClassroomId::new();
        let entries = vec![entry(room, None, t(8, 0), t(8, 40))];
        let slot = Slot {
            classroom_id: room,
            teacher_id: None,
            day_of_week: 2,
            start_time: t(8, 40),
            end_time: t(9, 20),
        };
        assert!(find_clash(&slot, &entries).is_none());
    }
}
