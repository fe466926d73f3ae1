mod common;

use axum::http::StatusCode;
use chrono::NaiveDate;
use serde_json::json;
use sqlx::PgPool;

use classdesk::modules::fees::service::FeeService;
use classdesk::modules::fees::sync::{ExistingFee, FeeSyncService, StructureAmount, plan_fee_sync};
use classdesk_config::FeeSyncConfig;
use classdesk_models::fees::{
    CreateFeeStructureDto, FeeStatus, PaymentMethod, RecordPaymentDto, UpdateFeeStructureDto,
};
use classdesk_models::users::UserRole;

use common::{create_classroom, create_current_term, create_student, create_user};

fn payment(amount: i64) -> RecordPaymentDto {
    RecordPaymentDto {
        amount,
        method: PaymentMethod::Cash,
        reference: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn test_new_structure_bills_every_active_student(pool: PgPool) {
    let config = FeeSyncConfig { batch_size: 2 };
    let (admin, _) = create_user(&pool, UserRole::Admin).await;
    let term_id = create_current_term(&pool).await;
    let classroom_id = create_classroom(&pool, "JSS 1A", 30).await;
    let mut students = Vec::new();
    for _ in 0..5 {
        students.push(create_student(&pool, Some(classroom_id), None).await.0);
    }

    FeeService::create_structure(
        &pool,
        &config,
        admin,
        CreateFeeStructureDto {
            name: "Tuition".to_string(),
            classroom_id,
            term_id: Some(term_id),
            amount: 50_000,
            due_date: None,
            description: None,
        },
    )
    .await
    .unwrap();

    for student_id in &students {
        let ledger = FeeService::get_student_ledger(&pool, *student_id, Some(term_id))
            .await
            .unwrap();
        assert_eq!(ledger.fees.len(), 1);
        assert_eq!(ledger.total_outstanding, 50_000);
        assert_eq!(ledger.fees[0].fee.status, FeeStatus::Unpaid);
    }

    // A second run has nothing left to do.
    let report = FeeSyncService::sync_classroom(&pool, &config, classroom_id, Some(admin))
        .await
        .unwrap();
    assert_eq!(report.students, 5);
    assert_eq!(report.created, 0);
    assert_eq!(report.unchanged, 5);
    assert_eq!(report.failed, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_payments_settle_a_fee_and_block_deletion(pool: PgPool) {
    let config = FeeSyncConfig::default();
    let (admin, _) = create_user(&pool, UserRole::Admin).await;
    let classroom_id = create_classroom(&pool, "JSS 2B", 30).await;
    let (student_id, _) = create_student(&pool, Some(classroom_id), None).await;

    let structure = FeeService::create_structure(
        &pool,
        &config,
        admin,
        CreateFeeStructureDto {
            name: "Development levy".to_string(),
            classroom_id,
            term_id: None,
            amount: 30_000,
            due_date: None,
            description: None,
        },
    )
    .await
    .unwrap();

    let ledger = FeeService::get_student_ledger(&pool, student_id, None).await.unwrap();
    let fee = &ledger.fees[0].fee;

    let receipt = FeeService::record_payment(&pool, admin, fee.id, payment(10_000))
        .await
        .unwrap();
    assert_eq!(receipt.student_fee.amount_paid, 10_000);
    assert_eq!(receipt.student_fee.status, FeeStatus::Partial);

    let err = FeeService::record_payment(&pool, admin, fee.id, payment(25_000))
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);

    let receipt = FeeService::record_payment(&pool, admin, fee.id, payment(20_000))
        .await
        .unwrap();
    assert_eq!(receipt.student_fee.status, FeeStatus::Paid);

    let payments = FeeService::get_payments(&pool, fee.id).await.unwrap();
    assert_eq!(payments.len(), 2);

    let verified = FeeService::verify_pin(&pool, fee.pin.as_str()).await.unwrap();
    assert_eq!(verified.fee.balance, 0);

    let err = FeeService::delete_structure(&pool, structure.id)
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_malformed_and_unknown_pins(pool: PgPool) {
    let err = FeeService::verify_pin(&pool, "12ab").await.unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);

    let err = FeeService::verify_pin(&pool, "000000000000").await.unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_amount_update_keeps_payments_made_after_planning(pool: PgPool) {
    let config = FeeSyncConfig::default();
    let (admin, _) = create_user(&pool, UserRole::Admin).await;
    let classroom_id = create_classroom(&pool, "JSS 3C", 30).await;
    let (student_id, _) = create_student(&pool, Some(classroom_id), None).await;

    let structure = FeeService::create_structure(
        &pool,
        &config,
        admin,
        CreateFeeStructureDto {
            name: "Sports levy".to_string(),
            classroom_id,
            term_id: None,
            amount: 30_000,
            due_date: None,
            description: None,
        },
    )
    .await
    .unwrap();
    let ledger = FeeService::get_student_ledger(&pool, student_id, None).await.unwrap();
    let fee_id = ledger.fees[0].fee.id;

    // Planned while nothing was paid yet.
    let plan = plan_fee_sync(
        &[student_id],
        &[StructureAmount {
            id: structure.id,
            amount: 40_000,
        }],
        &[ExistingFee {
            id: fee_id,
            student_id,
            fee_structure_id: structure.id,
            amount: 30_000,
            amount_paid: 0,
        }],
    );

    let receipt = FeeService::record_payment(&pool, admin, fee_id, payment(30_000))
        .await
        .unwrap();
    assert_eq!(receipt.student_fee.status, FeeStatus::Paid);

    let report = FeeSyncService::apply_plan(&pool, &config, classroom_id, &plan).await;
    assert_eq!(report.updated, 1);
    assert_eq!(report.failed, 0);

    let ledger = FeeService::get_student_ledger(&pool, student_id, None).await.unwrap();
    let fee = &ledger.fees[0].fee;
    assert_eq!(fee.amount, 40_000);
    assert_eq!(fee.amount_paid, 30_000);
    assert_eq!(fee.status, FeeStatus::Partial);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_null_clears_optional_structure_fields(pool: PgPool) {
    let config = FeeSyncConfig::default();
    let (admin, _) = create_user(&pool, UserRole::Admin).await;
    let term_id = create_current_term(&pool).await;
    let classroom_id = create_classroom(&pool, "SS 2C", 30).await;
    let due_date = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();

    let structure = FeeService::create_structure(
        &pool,
        &config,
        admin,
        CreateFeeStructureDto {
            name: "Excursion".to_string(),
            classroom_id,
            term_id: Some(term_id),
            amount: 8_000,
            due_date: Some(due_date),
            description: Some("Museum trip".to_string()),
        },
    )
    .await
    .unwrap();

    let dto: UpdateFeeStructureDto =
        serde_json::from_value(json!({ "description": null, "term_id": null })).unwrap();
    let updated = FeeService::update_structure(&pool, &config, admin, structure.id, dto)
        .await
        .unwrap();

    assert_eq!(updated.description, None);
    assert_eq!(updated.term_id, None);
    // Fields missing from the body keep their values.
    assert_eq!(updated.due_date, Some(due_date));
    assert_eq!(updated.name, "Excursion");
}
