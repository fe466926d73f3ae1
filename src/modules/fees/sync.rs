//! Fee synchronization.
//!
//! Brings the fee records of every active student in a classroom in line
//! with the classroom's active fee structures. Work happens in two steps:
//!
//! 1. [`plan_fee_sync`] compares what exists with what should exist and
//!    returns the operations needed. It does no I/O.
//! 2. The operations are flushed in batches of `FEE_SYNC_BATCH_SIZE`, one
//!    transaction per batch. A failed batch is rolled back and recorded in
//!    the report before the run moves on to the next one.
//!
//! The status of an updated record is computed at flush time from the row
//! locked inside the batch transaction, so payments recorded after planning
//! are never overwritten by a stale status.
//!
//! The pair `(student_id, fee_structure_id)` identifies a fee record, so
//! running the sync twice writes nothing the second time. Records are never
//! deleted: a student who leaves a classroom keeps the fees already billed.

use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

use anyhow::anyhow;
use serde_json::json;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use tracing::{info, instrument, warn};

use classdesk_config::FeeSyncConfig;
use classdesk_core::AppError;
use classdesk_models::audit::NewAuditLog;
use classdesk_models::fees::{ClassroomSyncError, FeeStatus, FeeSyncBatchError, FeeSyncReport};
use classdesk_models::ids::{ClassroomId, FeeStructureId, StudentFeeId, StudentId, UserId};
use classdesk_models::value_types::FeePin;

use crate::metrics::track_fee_sync;
use crate::modules::audit_logs::service::AuditService;

#[derive(Debug, Error)]
pub enum FeeSyncError {
    #[error("Classroom {0} not found")]
    ClassroomNotFound(ClassroomId),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<FeeSyncError> for AppError {
    fn from(err: FeeSyncError) -> Self {
        match err {
            FeeSyncError::ClassroomNotFound(_) => AppError::not_found(anyhow!("Classroom not found")),
            FeeSyncError::Database(e) => AppError::from(e),
        }
    }
}

/// An active fee structure as seen by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct StructureAmount {
    pub id: FeeStructureId,
    pub amount: i64,
}

/// An existing fee record as seen by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct ExistingFee {
    pub id: StudentFeeId,
    pub student_id: StudentId,
    pub fee_structure_id: FeeStructureId,
    pub amount: i64,
    pub amount_paid: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    Create {
        student_id: StudentId,
        fee_structure_id: FeeStructureId,
        amount: i64,
    },
    /// The new status is derived from the paid amount when the batch runs.
    UpdateAmount {
        student_fee_id: StudentFeeId,
        amount: i64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub operations: Vec<SyncOperation>,
    pub unchanged: usize,
}

/// Computes the writes that bring `existing` in line with every
/// `(student, structure)` pair.
pub fn plan_fee_sync(
    students: &[StudentId],
    structures: &[StructureAmount],
    existing: &[ExistingFee],
) -> SyncPlan {
    let by_pair: HashMap<(StudentId, FeeStructureId), &ExistingFee> = existing
        .iter()
        .map(|fee| ((fee.student_id, fee.fee_structure_id), fee))
        .collect();

    let mut plan = SyncPlan::default();

    for &student_id in students {
        for structure in structures {
            match by_pair.get(&(student_id, structure.id)) {
                None => plan.operations.push(SyncOperation::Create {
                    student_id,
                    fee_structure_id: structure.id,
                    amount: structure.amount,
                }),
                Some(fee) if fee.amount != structure.amount => {
                    plan.operations.push(SyncOperation::UpdateAmount {
                        student_fee_id: fee.id,
                        amount: structure.amount,
                    })
                }
                Some(_) => plan.unchanged += 1,
            }
        }
    }

    plan
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct BatchOutcome {
    created: usize,
    updated: usize,
}

pub struct FeeSyncService;

impl FeeSyncService {
    /// Synchronizes one classroom and records a `fees.sync` audit event.
    #[instrument(skip(db, config))]
    pub async fn sync_classroom(
        db: &PgPool,
        config: &FeeSyncConfig,
        classroom_id: ClassroomId,
        actor: Option<UserId>,
    ) -> Result<FeeSyncReport, FeeSyncError> {
        let report = Self::run_classroom(db, config, classroom_id).await?;
        Self::record_run(db, actor, &report).await;
        Ok(report)
    }

    /// Synchronizes every active classroom that has at least one active
    /// fee structure. A classroom that fails is recorded in the report and
    /// the run moves on.
    #[instrument(skip(db, config))]
    pub async fn sync_all(
        db: &PgPool,
        config: &FeeSyncConfig,
        actor: Option<UserId>,
    ) -> Result<FeeSyncReport, FeeSyncError> {
        let classroom_ids = sqlx::query_scalar::<_, ClassroomId>(
            r#"SELECT DISTINCT c.id
               FROM classrooms c
               JOIN fee_structures fs ON fs.classroom_id = c.id AND fs.is_active
               WHERE c.is_active
               ORDER BY c.id"#,
        )
        .fetch_all(db)
        .await?;

        let mut total = FeeSyncReport::default();
        for classroom_id in classroom_ids {
            let outcome = Self::run_classroom(db, config, classroom_id).await;
            absorb_classroom_outcome(&mut total, classroom_id, outcome);
        }

        Self::record_run(db, actor, &total).await;
        Ok(total)
    }

    async fn run_classroom(
        db: &PgPool,
        config: &FeeSyncConfig,
        classroom_id: ClassroomId,
    ) -> Result<FeeSyncReport, FeeSyncError> {
        let started = Instant::now();

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM classrooms WHERE id = $1)",
        )
        .bind(classroom_id)
        .fetch_one(db)
        .await?;
        if !exists {
            return Err(FeeSyncError::ClassroomNotFound(classroom_id));
        }

        let students = sqlx::query_scalar::<_, StudentId>(
            "SELECT id FROM students WHERE classroom_id = $1 AND status = 'active'",
        )
        .bind(classroom_id)
        .fetch_all(db)
        .await?;

        let structures = sqlx::query_as::<_, StructureAmount>(
            "SELECT id, amount FROM fee_structures WHERE classroom_id = $1 AND is_active",
        )
        .bind(classroom_id)
        .fetch_all(db)
        .await?;

        let existing = sqlx::query_as::<_, ExistingFee>(
            r#"SELECT sf.id, sf.student_id, sf.fee_structure_id, sf.amount, sf.amount_paid
               FROM student_fees sf
               JOIN fee_structures fs ON fs.id = sf.fee_structure_id
               WHERE fs.classroom_id = $1"#,
        )
        .bind(classroom_id)
        .fetch_all(db)
        .await?;

        let plan = plan_fee_sync(&students, &structures, &existing);

        let mut report = FeeSyncReport {
            students: students.len(),
            fee_structures: structures.len(),
            ..Self::apply_plan(db, config, classroom_id, &plan).await
        };

        let elapsed = started.elapsed();
        report.duration_ms = elapsed.as_millis() as u64;

        track_fee_sync(
            report.created,
            report.updated,
            report.failed,
            elapsed.as_secs_f64(),
        );
        info!(
            classroom_id = %classroom_id,
            planned = report.planned,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Fee sync completed"
        );

        Ok(report)
    }

    /// Flushes a plan in batches of `config.batch_size`. Batch failures are
    /// recorded in the returned report rather than returned as errors.
    pub async fn apply_plan(
        db: &PgPool,
        config: &FeeSyncConfig,
        classroom_id: ClassroomId,
        plan: &SyncPlan,
    ) -> FeeSyncReport {
        let mut report = FeeSyncReport {
            classroom_id: Some(classroom_id),
            planned: plan.operations.len(),
            unchanged: plan.unchanged,
            ..Default::default()
        };
        flush_batches(
            classroom_id,
            &plan.operations,
            config.batch_size,
            &mut report,
            |batch| execute_batch(db, batch),
        )
        .await;
        report
    }

    async fn record_run(db: &PgPool, actor: Option<UserId>, report: &FeeSyncReport) {
        let mut entry = NewAuditLog::event("fees.sync", "fees").details(json!({
            "planned": report.planned,
            "created": report.created,
            "updated": report.updated,
            "failed": report.failed,
            "batches": report.batches,
        }));
        entry.actor_id = actor;
        if let Some(classroom_id) = report.classroom_id {
            entry = entry.entity(classroom_id);
        }

        if let Err(err) = AuditService::record(db, entry).await {
            warn!(error = %err, "Failed to write fee sync audit log");
        }
    }
}

fn absorb_classroom_outcome(
    total: &mut FeeSyncReport,
    classroom_id: ClassroomId,
    outcome: Result<FeeSyncReport, FeeSyncError>,
) {
    match outcome {
        Ok(report) => total.absorb(report),
        // Deleted between the listing and the run.
        Err(FeeSyncError::ClassroomNotFound(_)) => {}
        Err(e) => {
            warn!(classroom_id = %classroom_id, error = %e, "Fee sync failed for classroom");
            total.classroom_errors.push(ClassroomSyncError {
                classroom_id,
                error: e.to_string(),
            });
        }
    }
}

/// Runs `execute` on each chunk of `operations`. A failing chunk is counted
/// as failed and the next one still runs.
async fn flush_batches<F, Fut>(
    classroom_id: ClassroomId,
    operations: &[SyncOperation],
    batch_size: usize,
    report: &mut FeeSyncReport,
    mut execute: F,
) where
    F: FnMut(Vec<SyncOperation>) -> Fut,
    Fut: Future<Output = Result<BatchOutcome, sqlx::Error>>,
{
    for (index, batch) in operations.chunks(batch_size.max(1)).enumerate() {
        report.batches += 1;
        match execute(batch.to_vec()).await {
            Ok(outcome) => {
                report.created += outcome.created;
                report.updated += outcome.updated;
            }
            Err(e) => {
                warn!(
                    classroom_id = %classroom_id,
                    batch = index,
                    operations = batch.len(),
                    error = %e,
                    "Fee sync batch failed"
                );
                report.failed += batch.len();
                report.errors.push(FeeSyncBatchError {
                    batch: index,
                    operations: batch.len(),
                    error: e.to_string(),
                });
            }
        }
    }
}

async fn execute_batch(
    db: &PgPool,
    batch: Vec<SyncOperation>,
) -> Result<BatchOutcome, sqlx::Error> {
    let mut tx = db.begin().await?;
    let mut outcome = BatchOutcome::default();

    for operation in batch {
        match operation {
            SyncOperation::Create {
                student_id,
                fee_structure_id,
                amount,
            } => {
                let result = sqlx::query(
                    r#"INSERT INTO student_fees (student_id, fee_structure_id, amount, amount_paid, status, pin)
                       VALUES ($1, $2, $3, 0, $4, $5)
                       ON CONFLICT (student_id, fee_structure_id) DO NOTHING"#,
                )
                .bind(student_id)
                .bind(fee_structure_id)
                .bind(amount)
                .bind(FeeStatus::from_amounts(amount, 0))
                .bind(FeePin::generate())
                .execute(&mut *tx)
                .await?;
                outcome.created += result.rows_affected() as usize;
            }
            SyncOperation::UpdateAmount {
                student_fee_id,
                amount,
            } => {
                // Same lock as payment recording.
                let amount_paid = sqlx::query_scalar::<_, i64>(
                    "SELECT amount_paid FROM student_fees WHERE id = $1 FOR UPDATE",
                )
                .bind(student_fee_id)
                .fetch_optional(&mut *tx)
                .await?;
                let Some(amount_paid) = amount_paid else {
                    continue;
                };

                let result = sqlx::query(
                    r#"UPDATE student_fees
                       SET amount = $2, status = $3, updated_at = NOW()
                       WHERE id = $1"#,
                )
                .bind(student_fee_id)
                .bind(amount)
                .bind(FeeStatus::from_amounts(amount, amount_paid))
                .execute(&mut *tx)
                .await?;
                outcome.updated += result.rows_affected() as usize;
            }
        }
    }

    tx.commit().await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structure(amount: i64) -> StructureAmount {
        StructureAmount {
            id: FeeStructureId::new(),
            amount,
        }
    }

    #[test]
    fn test_plans_every_missing_pair() {
        let students = vec![StudentId::new(), StudentId::new(), StudentId::new()];
        let structures = vec![structure(50_000), structure(12_500)];

        let plan = plan_fee_sync(&students, &structures, &[]);

        assert_eq!(plan.operations.len(), 6);
        assert_eq!(plan.unchanged, 0);
        assert!(
            plan.operations
                .iter()
                .all(|op| matches!(op, SyncOperation::Create { .. }))
        );
    }

    #[test]
    fn test_existing_pairs_are_left_alone() {
        let student = StudentId::new();
        let tuition = structure(50_000);
        let existing = vec![ExistingFee {
            id: StudentFeeId::new(),
            student_id: student,
            fee_structure_id: tuition.id,
            amount: 50_000,
            amount_paid: 20_000,
        }];

        let plan = plan_fee_sync(&[student], &[tuition], &existing);

        assert!(plan.operations.is_empty());
        assert_eq!(plan.unchanged, 1);
    }

    #[test]
    fn test_amount_drift_plans_an_update() {
        let student = StudentId::new();
        let tuition = structure(30_000);
        let fee_id = StudentFeeId::new();
        let existing = vec![ExistingFee {
            id: fee_id,
            student_id: student,
            fee_structure_id: tuition.id,
            amount: 50_000,
            amount_paid: 30_000,
        }];

        let plan = plan_fee_sync(&[student], &[tuition], &existing);

        assert_eq!(
            plan.operations,
            vec![SyncOperation::UpdateAmount {
                student_fee_id: fee_id,
                amount: 30_000,
            }]
        );
    }

    #[test]
    fn test_fees_of_other_students_do_not_count() {
        let placed = StudentId::new();
        let other = StudentId::new();
        let tuition = structure(10_000);
        let existing = vec![ExistingFee {
            id: StudentFeeId::new(),
            student_id: other,
            fee_structure_id: tuition.id,
            amount: 10_000,
            amount_paid: 0,
        }];

        let plan = plan_fee_sync(&[placed], &[tuition], &existing);

        assert_eq!(
            plan.operations,
            vec![SyncOperation::Create {
                student_id: placed,
                fee_structure_id: tuition.id,
                amount: 10_000,
            }]
        );
    }

    #[test]
    fn test_empty_classroom_plans_nothing() {
        let plan = plan_fee_sync(&[], &[structure(1_000)], &[]);
        assert_eq!(plan, SyncPlan::default());
    }

    #[test]
    fn test_operations_split_into_batches() {
        let students: Vec<_> = (0..1_201).map(|_| StudentId::new()).collect();
        let plan = plan_fee_sync(&students, &[structure(5_000)], &[]);
        let batches: Vec<_> = plan.operations.chunks(500).map(<[_]>::len).collect();
        assert_eq!(batches, vec![500, 500, 201]);
    }

    #[test]
    fn test_sync_error_maps_to_404() {
        let err: AppError = FeeSyncError::ClassroomNotFound(ClassroomId::new()).into();
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
    }

    fn creates(count: usize) -> Vec<SyncOperation> {
        (0..count)
            .map(|_| SyncOperation::Create {
                student_id: StudentId::new(),
                fee_structure_id: FeeStructureId::new(),
                amount: 1_000,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_later_batches() {
        let classroom_id = ClassroomId::new();
        let operations = creates(5);
        let mut report = FeeSyncReport::default();
        let mut calls = 0;

        flush_batches(classroom_id, &operations, 2, &mut report, |batch| {
            let call = calls;
            calls += 1;
            async move {
                if call == 1 {
                    Err(sqlx::Error::Protocol("connection reset".into()))
                } else {
                    Ok::<_, sqlx::Error>(BatchOutcome {
                        created: batch.len(),
                        updated: 0,
                    })
                }
            }
        })
        .await;

        assert_eq!(calls, 3);
        assert_eq!(report.batches, 3);
        assert_eq!(report.created, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].batch, 1);
        assert_eq!(report.errors[0].operations, 2);
        assert!(report.errors[0].error.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_zero_batch_size_flushes_one_at_a_time() {
        let mut report = FeeSyncReport::default();
        flush_batches(ClassroomId::new(), &creates(3), 0, &mut report, |batch| async move {
            Ok::<_, sqlx::Error>(BatchOutcome {
                created: batch.len(),
                updated: 0,
            })
        })
        .await;
        assert_eq!(report.batches, 3);
        assert_eq!(report.created, 3);
    }

    #[test]
    fn test_one_failing_classroom_does_not_abort_the_run() {
        let failing = ClassroomId::new();
        let mut total = FeeSyncReport::default();

        absorb_classroom_outcome(
            &mut total,
            ClassroomId::new(),
            Ok(FeeSyncReport {
                created: 4,
                batches: 1,
                ..Default::default()
            }),
        );
        absorb_classroom_outcome(
            &mut total,
            failing,
            Err(FeeSyncError::Database(sqlx::Error::PoolTimedOut)),
        );
        absorb_classroom_outcome(
            &mut total,
            ClassroomId::new(),
            Ok(FeeSyncReport {
                created: 2,
                batches: 1,
                ..Default::default()
            }),
        );

        assert_eq!(total.created, 6);
        assert_eq!(total.batches, 2);
        assert_eq!(total.classroom_errors.len(), 1);
        assert_eq!(total.classroom_errors[0].classroom_id, failing);
    }

    #[test]
    fn test_vanished_classroom_is_skipped_silently() {
        let mut total = FeeSyncReport::default();
        let gone = ClassroomId::new();
        absorb_classroom_outcome(&mut total, gone, Err(FeeSyncError::ClassroomNotFound(gone)));
        assert!(total.classroom_errors.is_empty());
    }
}
