use sqlx::PgPool;
use tracing::instrument;

use classdesk_core::AppError;
use classdesk_models::attendance::attendance_rate;
use classdesk_models::ids::{ClassroomId, UserId};
use classdesk_models::portal::{AdminDashboard, TeacherClass};

/// One classroom/subject pairing as returned by the teacher class query.
pub type TeacherClassRow = (ClassroomId, String, String, bool, Option<String>);

pub struct PortalService;

impl PortalService {
    #[instrument(skip(db))]
    pub async fn admin_dashboard(db: &PgPool) -> Result<AdminDashboard, AppError> {
        let (students, teachers, parents, classrooms, outstanding_fees, marked, attended) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64, i64)>(
                r#"SELECT
                       (SELECT COUNT(*) FROM students WHERE status = 'active'),
                       (SELECT COUNT(*) FROM users WHERE role = 'teacher' AND is_active),
                       (SELECT COUNT(*) FROM users WHERE role = 'parent' AND is_active),
                       (SELECT COUNT(*) FROM classrooms WHERE is_active),
                       (SELECT COALESCE(SUM(amount - amount_paid), 0)::BIGINT
                          FROM student_fees WHERE amount_paid < amount),
                       (SELECT COUNT(*) FROM attendance WHERE date = CURRENT_DATE),
                       (SELECT COUNT(*) FROM attendance
                          WHERE date = CURRENT_DATE AND status IN ('present', 'late'))"#,
            )
            .fetch_one(db)
            .await?;

        Ok(AdminDashboard {
            students,
            teachers,
            parents,
            classrooms,
            outstanding_fees,
            attendance_marked_today: marked,
            attendance_rate_today: attendance_rate(attended, marked),
        })
    }

    /// Classrooms the teacher runs as class teacher or teaches a subject in.
    #[instrument(skip(db))]
    pub async fn teacher_classes(
        db: &PgPool,
        teacher_id: UserId,
    ) -> Result<Vec<TeacherClass>, AppError> {
        let rows = sqlx::query_as::<_, TeacherClassRow>(
            r#"SELECT c.id, c.name, c.level,
                      COALESCE(c.class_teacher_id = $1, FALSE) AS is_class_teacher,
                      sub.name AS subject_name
               FROM classrooms c
               LEFT JOIN classroom_subjects cs ON cs.classroom_id = c.id AND cs.teacher_id = $1
               LEFT JOIN subjects sub ON sub.id = cs.subject_id
               WHERE c.class_teacher_id = $1 OR cs.teacher_id = $1
               ORDER BY c.name, sub.name"#,
        )
        .bind(teacher_id)
        .fetch_all(db)
        .await?;

        Ok(group_teacher_classes(rows))
    }
}

/// Folds per-subject rows into one entry per classroom. Rows must arrive
/// grouped by classroom.
pub fn group_teacher_classes(rows: Vec<TeacherClassRow>) -> Vec<TeacherClass> {
    let mut classes: Vec<TeacherClass> = Vec::new();

    for (classroom_id, classroom_name, level, is_class_teacher, subject) in rows {
        match classes.last_mut() {
            Some(last) if last.classroom_id == classroom_id => {
                last.subjects.extend(subject);
            }
            _ => classes.push(TeacherClass {
                classroom_id,
                classroom_name,
                level,
                is_class_teacher,
                subjects: subject.into_iter().collect(),
            }),
        }
    }

    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects_are_grouped_per_classroom() {
        let jss1 = ClassroomId::new();
        let jss2 = ClassroomId::new();
        let rows = vec![
            (jss1, "JSS 1A".into(), "JSS 1".into(), true, Some("English".into())),
            (jss1, "JSS 1A".into(), "JSS 1".into(), true, Some("Mathematics".into())),
            (jss2, "JSS 2B".into(), "JSS 2".into(), false, Some("Mathematics".into())),
        ];

        let classes = group_teacher_classes(rows);

        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].subjects, vec!["English", "Mathematics"]);
        assert!(classes[0].is_class_teacher);
        assert_eq!(classes[1].classroom_name, "JSS 2B");
        assert_eq!(classes[1].subjects, vec!["Mathematics"]);
    }

    #[test]
    fn test_class_teacher_without_subjects() {
        let id = ClassroomId::new();
        let classes = group_teacher_classes(vec![(id, "SS 1".into(), "SS 1".into(), true, None)]);

        assert_eq!(classes.len(), 1);
        assert!(classes[0].subjects.is_empty());
    }
}
