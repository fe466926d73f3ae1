//! Weekly timetable entries.

use chrono::{DateTime, NaiveTime, Utc};
use classdesk_core::serde::deserialize_nullable;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::ids::{ClassroomId, SubjectId, TimetableEntryId, UserId};
use crate::validation::ordered_times;

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct TimetableEntry {
    pub id: TimetableEntryId,
    pub classroom_id: ClassroomId,
    pub subject_id: SubjectId,
    pub teacher_id: Option<UserId>,
    /// 1 = Monday .. 7 = Sunday
    pub day_of_week: i16,
    #[schema(value_type = String, example = "08:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "08:40:00")]
    pub end_time: NaiveTime,
    pub room: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct TimetableEntryDetails {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub entry: TimetableEntry,
    pub classroom_name: String,
    pub subject_name: String,
    pub teacher_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
#[validate(schema(function = "validate_create_times"))]
pub struct CreateTimetableEntryDto {
    pub classroom_id: ClassroomId,
    pub subject_id: SubjectId,
    pub teacher_id: Option<UserId>,
    #[validate(range(min = 1, max = 7, message = "Day of week must be between 1 and 7"))]
    pub day_of_week: i16,
    #[schema(value_type = String, example = "08:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "08:40:00")]
    pub end_time: NaiveTime,
    #[validate(length(max = 50))]
    pub room: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, Validate, ToSchema)]
pub struct UpdateTimetableEntryDto {
    pub subject_id: Option<SubjectId>,
    /// `null` leaves the slot without a teacher
    #[serde(default, deserialize_with = "deserialize_nullable")]
    #[schema(value_type = Option<UserId>)]
    pub teacher_id: Option<Option<UserId>>,
    #[validate(range(min = 1, max = 7, message = "Day of week must be between 1 and 7"))]
    pub day_of_week: Option<i16>,
    #[schema(value_type = Option<String>, example = "08:00:00")]
    pub start_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "08:40:00")]
    pub end_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    #[schema(value_type = Option<String>)]
    #[validate(length(max = 50))]
    pub room: Option<Option<String>>,
}

fn validate_create_times(dto: &CreateTimetableEntryDto) -> Result<(), ValidationError> {
    ordered_times(dto.start_time, dto.end_time)
}

#[derive(Deserialize, Debug, Clone, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TimetableFilterParams {
    pub classroom_id: Option<ClassroomId>,
    pub teacher_id: Option<UserId>,
    pub day_of_week: Option<i16>,
}

/// The parts of an entry that decide whether two entries clash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub classroom_id: ClassroomId,
    pub teacher_id: Option<UserId>,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl Slot {
    /// Two slots clash when they fall on the same day, overlap in time and
    /// share the classroom or the teacher. Back-to-back periods do not clash.
    pub fn clashes_with(&self, other: &Slot) -> bool {
        if self.day_of_week != other.day_of_week {
            return false;
        }
        if !(self.start_time < other.end_time && other.start_time < self.end_time) {
            return false;
        }
        let same_teacher = matches!(
            (self.teacher_id, other.teacher_id),
            (Some(a), Some(b)) if a == b
        );
        self.classroom_id == other.classroom_id || same_teacher
    }
}

impl From<&TimetableEntry> for Slot {
    fn from(entry: &TimetableEntry) -> Self {
        Self {
            classroom_id: entry.classroom_id,
            teacher_id: entry.teacher_id,
            day_of_week: entry.day_of_week,
            start_time: entry.start_time,
            end_time: entry.end_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn slot(classroom: ClassroomId, teacher: Option<UserId>, start: NaiveTime, end: NaiveTime) -> Slot {
        Slot {
            classroom_id: classroom,
            teacher_id: teacher,
            day_of_week: 1,
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn test_same_classroom_overlap_clashes() {
        let room = ClassroomId::new();
        let a = slot(room, None, t(8, 0), t(8, 40));
        let b = slot(room, None, t(8, 30), t(9, 10));
        assert!(a.clashes_with(&b));
        assert!(b.clashes_with(&a));
    }

    #[test]
    fn test_back_to_back_does_not_clash() {
        let room = ClassroomId::new();
        let a = slot(room, None, t(8, 0), t(8, 40));
        let b = slot(room, None, t(8, 40), t(9, 20));
        assert!(!a.clashes_with(&b));
    }

    #[test]
    fn test_same_teacher_in_two_rooms_clashes() {
        let teacher = Some(UserId::new());
        let a = slot(ClassroomId::new(), teacher, t(10, 0), t(10, 40));
        let b = slot(ClassroomId::new(), teacher, t(10, 20), t(11, 0));
        assert!(a.clashes_with(&b));
    }

    #[test]
    fn test_unassigned_teachers_do_not_clash_across_rooms() {
        let a = slot(ClassroomId::new(), None, t(10, 0), t(10, 40));
        let b = slot(ClassroomId::new(), None, t(10, 0), t(10, 40));
        assert!(!a.clashes_with(&b));
    }

    #[test]
    fn test_different_days_do_not_clash() {
        let room = ClassroomId::new();
        let a = slot(room, None, t(8, 0), t(8, 40));
        let mut b = a;
        b.day_of_week = 2;
        assert!(!a.clashes_with(&b));
    }

    #[test]
    fn test_reversed_times_fail_validation() {
        let dto = CreateTimetableEntryDto {
            classroom_id: ClassroomId::new(),
            subject_id: SubjectId::new(),
            teacher_id: None,
            day_of_week: 3,
            start_time: t(9, 0),
            end_time: t(8, 0),
            room: None,
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_update_tells_null_from_missing() {
        let dto: UpdateTimetableEntryDto =
            serde_json::from_str(r#"{"teacher_id":null,"day_of_week":2}"#).unwrap();
        assert_eq!(dto.teacher_id, Some(None));
        assert_eq!(dto.room, None);
        assert_eq!(dto.day_of_week, Some(2));
    }

    #[test]
    fn test_cleared_room_skips_length_check() {
        let dto: UpdateTimetableEntryDto = serde_json::from_str(r#"{"room":null}"#).unwrap();
        assert!(dto.validate().is_ok());

        let long = "x".repeat(51);
        let dto: UpdateTimetableEntryDto =
            serde_json::from_str(&format!(r#"{{"room":"{}"}}"#, long)).unwrap();
        assert!(dto.validate().is_err());
    }
}
