mod common;

use axum::http::StatusCode;
use sqlx::PgPool;
use tower::ServiceExt;

use classdesk::modules::results::service::ResultService;
use classdesk_models::results::{BulkResultsDto, ResultEntryDto};
use classdesk_models::users::UserRole;

use common::{
    body_json, create_classroom, create_current_term, create_student, create_subject, create_user,
    json_request, login, setup_test_app,
};

fn entry(student_id: classdesk_models::ids::StudentId, ca: f64, exam: f64) -> ResultEntryDto {
    ResultEntryDto {
        student_id,
        ca_score: ca,
        exam_score: exam,
        remark: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_report_card_ranks_by_average(pool: PgPool) {
    let (teacher, _) = create_user(&pool, UserRole::Teacher).await;
    let term_id = create_current_term(&pool).await;
    let classroom_id = create_classroom(&pool, "SS 1A", 40).await;
    let maths = create_subject(&pool, "MTH", classroom_id).await;
    let english = create_subject(&pool, "ENG", classroom_id).await;

    let (ada, _) = create_student(&pool, Some(classroom_id), None).await;
    let (bayo, _) = create_student(&pool, Some(classroom_id), None).await;
    let (chi, _) = create_student(&pool, Some(classroom_id), None).await;

    let recorded = ResultService::record_bulk(
        &pool,
        teacher,
        BulkResultsDto {
            classroom_id,
            subject_id: maths,
            term_id,
            entries: vec![entry(ada, 35.0, 50.0), entry(bayo, 20.0, 30.0), entry(chi, 35.0, 50.0)],
        },
    )
    .await
    .unwrap();
    assert_eq!(recorded.recorded, 3);
    let ada_maths = recorded.results.iter().find(|r| r.student_id == ada).unwrap();
    assert_eq!(ada_maths.total, 85.0);
    assert_eq!(ada_maths.grade, "A");
    assert_eq!(ada_maths.remark.as_deref(), Some("Excellent"));

    ResultService::record_bulk(
        &pool,
        teacher,
        BulkResultsDto {
            classroom_id,
            subject_id: english,
            term_id,
            entries: vec![entry(ada, 30.0, 45.0), entry(bayo, 10.0, 25.0), entry(chi, 30.0, 45.0)],
        },
    )
    .await
    .unwrap();

    let card = ResultService::report_card(&pool, bayo, term_id).await.unwrap();
    assert_eq!(card.subjects.len(), 2);
    assert_eq!(card.grand_total, 85.0);
    assert_eq!(card.average, 42.5);
    assert_eq!(card.class_size, 3);
    assert_eq!(card.position, Some(3));

    // Ada and Chi tie for first.
    let card = ResultService::report_card(&pool, chi, term_id).await.unwrap();
    assert_eq!(card.position, Some(1));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_rerecording_replaces_previous_scores(pool: PgPool) {
    let (teacher, _) = create_user(&pool, UserRole::Teacher).await;
    let term_id = create_current_term(&pool).await;
    let classroom_id = create_classroom(&pool, "SS 2A", 40).await;
    let subject_id = create_subject(&pool, "PHY", classroom_id).await;
    let (student, _) = create_student(&pool, Some(classroom_id), None).await;

    for exam in [20.0, 55.0] {
        ResultService::record_bulk(
            &pool,
            teacher,
            BulkResultsDto {
                classroom_id,
                subject_id,
                term_id,
                entries: vec![entry(student, 30.0, exam)],
            },
        )
        .await
        .unwrap();
    }

    let results = ResultService::get_student_results(&pool, student, Some(term_id))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].result.total, 85.0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_bulk_rejects_students_outside_the_classroom(pool: PgPool) {
    let (teacher, _) = create_user(&pool, UserRole::Teacher).await;
    let term_id = create_current_term(&pool).await;
    let classroom_id = create_classroom(&pool, "SS 3A", 40).await;
    let other_classroom = create_classroom(&pool, "SS 3B", 40).await;
    let subject_id = create_subject(&pool, "CHM", classroom_id).await;
    let (inside, _) = create_student(&pool, Some(classroom_id), None).await;
    let (outside, _) = create_student(&pool, Some(other_classroom), None).await;

    let err = ResultService::record_bulk(
        &pool,
        teacher,
        BulkResultsDto {
            classroom_id,
            subject_id,
            term_id,
            entries: vec![entry(inside, 30.0, 40.0), entry(outside, 30.0, 40.0)],
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_parent_sees_only_linked_children(pool: PgPool) {
    let (parent, parent_email) = create_user(&pool, UserRole::Parent).await;
    let (other_parent, _) = create_user(&pool, UserRole::Parent).await;
    let classroom_id = create_classroom(&pool, "JSS 3A", 40).await;
    let (own_child, _) = create_student(&pool, Some(classroom_id), Some(parent)).await;
    let (someone_else, _) = create_student(&pool, Some(classroom_id), Some(other_parent)).await;

    let app = setup_test_app(pool);
    let token = login(&app, &parent_email).await;

    let response = app
        .clone()
        .oneshot(json_request("GET", "/api/portal/parent/children", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let children = body_json(response).await;
    assert_eq!(children.as_array().unwrap().len(), 1);
    assert_eq!(children[0]["id"], own_child.to_string());

    let response = app
        .clone()
        .oneshot(json_request(
            "GET",
            &format!("/api/portal/parent/children/{}/results", own_child),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request(
            "GET",
            &format!("/api/portal/parent/children/{}/fees", someone_else),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
