mod common;

use axum::http::StatusCode;
use chrono::NaiveDate;
use sqlx::PgPool;

use classdesk::modules::academic_sessions::service::AcademicSessionService;
use classdesk::modules::results::service::ResultService;
use classdesk::modules::terms::service::TermService;
use classdesk_models::academic_sessions::{AcademicSession, CreateSessionDto};
use classdesk_models::results::{BulkResultsDto, ResultEntryDto};
use classdesk_models::terms::CreateTermDto;
use classdesk_models::users::UserRole;

use common::{create_classroom, create_current_term, create_student, create_subject, create_user};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn next_session(pool: &PgPool) -> AcademicSession {
    AcademicSessionService::create_session(
        pool,
        CreateSessionDto {
            name: "2026/2027".to_string(),
            start_date: date(2026, 9, 1),
            end_date: date(2027, 7, 31),
        },
    )
    .await
    .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn test_switching_session_clears_the_current_term(pool: PgPool) {
    let old_term = create_current_term(&pool).await;
    let next = next_session(&pool).await;

    AcademicSessionService::set_current(&pool, next.id).await.unwrap();

    let term = TermService::get_term(&pool, old_term).await.unwrap();
    assert!(!term.is_current);
    let err = TermService::get_current_term(&pool).await.unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_terms_with_results_cannot_be_deleted(pool: PgPool) {
    let (teacher, _) = create_user(&pool, UserRole::Teacher).await;
    let term_id = create_current_term(&pool).await;
    let classroom_id = create_classroom(&pool, "SS 1C", 40).await;
    let subject_id = create_subject(&pool, "BIO", classroom_id).await;
    let (student_id, _) = create_student(&pool, Some(classroom_id), None).await;

    ResultService::record_bulk(
        &pool,
        teacher,
        BulkResultsDto {
            classroom_id,
            subject_id,
            term_id,
            entries: vec![ResultEntryDto {
                student_id,
                ca_score: 25.0,
                exam_score: 40.0,
                remark: None,
            }],
        },
    )
    .await
    .unwrap();

    let err = TermService::delete_term(&pool, term_id).await.unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);

    let old_session = TermService::get_term(&pool, term_id).await.unwrap().session_id;
    let next = next_session(&pool).await;
    AcademicSessionService::set_current(&pool, next.id).await.unwrap();

    let err = AcademicSessionService::delete_session(&pool, old_session)
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);

    let results = ResultService::get_student_results(&pool, student_id, Some(term_id))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);

    // A term nobody recorded results for still goes away.
    let empty = TermService::create_term(
        &pool,
        next.id,
        CreateTermDto {
            name: "First Term".to_string(),
            sequence: None,
            start_date: date(2026, 9, 1),
            end_date: date(2026, 12, 15),
        },
    )
    .await
    .unwrap();
    TermService::delete_term(&pool, empty.id).await.unwrap();
}
