//! Fee structures, per-student fee records and payments.
//!
//! Amounts are integers in minor currency units (kobo, cents).

use chrono::{DateTime, NaiveDate, Utc};
use classdesk_core::serde::{deserialize_nullable, deserialize_optional_bool};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::{ClassroomId, FeePaymentId, FeeStructureId, StudentFeeId, StudentId, TermId, UserId};
use crate::value_types::FeePin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "fee_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FeeStatus {
    Unpaid,
    Partial,
    Paid,
}

impl FeeStatus {
    /// Status implied by how much of `amount` has been paid.
    pub fn from_amounts(amount: i64, amount_paid: i64) -> Self {
        if amount_paid >= amount {
            FeeStatus::Paid
        } else if amount_paid > 0 {
            FeeStatus::Partial
        } else {
            FeeStatus::Unpaid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    Other,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct FeeStructure {
    pub id: FeeStructureId,
    pub name: String,
    pub classroom_id: ClassroomId,
    pub term_id: Option<TermId>,
    pub amount: i64,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct CreateFeeStructureDto {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    pub classroom_id: ClassroomId,
    pub term_id: Option<TermId>,
    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount: i64,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
}

/// Missing fields are left unchanged; `null` clears a nullable field.
#[derive(Deserialize, Debug, Clone, Default, Validate, ToSchema)]
pub struct UpdateFeeStructureDto {
    #[validate(length(min = 1, max = 150))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    #[schema(value_type = Option<TermId>)]
    pub term_id: Option<Option<TermId>>,
    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    #[schema(value_type = Option<NaiveDate>)]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeeStructureFilterParams {
    pub classroom_id: Option<ClassroomId>,
    pub term_id: Option<TermId>,
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub is_active: Option<bool>,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct StudentFee {
    pub id: StudentFeeId,
    pub student_id: StudentId,
    pub fee_structure_id: FeeStructureId,
    pub amount: i64,
    pub amount_paid: i64,
    pub status: FeeStatus,
    pub pin: FeePin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct StudentFeeDetails {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fee: StudentFee,
    pub fee_name: String,
    pub term_id: Option<TermId>,
    pub due_date: Option<NaiveDate>,
    pub balance: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct StudentFeeLedger {
    pub student_id: StudentId,
    pub fees: Vec<StudentFeeDetails>,
    pub total_amount: i64,
    pub total_paid: i64,
    pub total_outstanding: i64,
}

impl StudentFeeLedger {
    pub fn new(student_id: StudentId, fees: Vec<StudentFeeDetails>) -> Self {
        let total_amount = fees.iter().map(|f| f.fee.amount).sum();
        let total_paid = fees.iter().map(|f| f.fee.amount_paid).sum();
        let total_outstanding = fees.iter().map(|f| f.balance.max(0)).sum();
        Self {
            student_id,
            fees,
            total_amount,
            total_paid,
            total_outstanding,
        }
    }
}

/// Result of a PIN lookup.
#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct FeeVerification {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fee: StudentFeeDetails,
    pub student_name: String,
    pub admission_number: String,
}

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, ToSchema)]
pub struct FeePayment {
    pub id: FeePaymentId,
    pub student_fee_id: StudentFeeId,
    pub amount: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub recorded_by: Option<UserId>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct RecordPaymentDto {
    #[validate(range(min = 1, message = "Payment amount must be positive"))]
    pub amount: i64,
    pub method: PaymentMethod,
    #[validate(length(max = 100))]
    pub reference: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct PaymentReceipt {
    pub payment: FeePayment,
    pub student_fee: StudentFee,
}

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct SyncFeesDto {
    pub classroom_id: ClassroomId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct FeeSyncBatchError {
    /// Zero-based batch index
    pub batch: usize,
    /// Operations in the failed batch
    pub operations: usize,
    pub error: String,
}

/// A classroom the all-classrooms run could not synchronize.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct ClassroomSyncError {
    pub classroom_id: ClassroomId,
    pub error: String,
}

/// Outcome of one fee synchronization run over a classroom.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, ToSchema)]
pub struct FeeSyncReport {
    pub classroom_id: Option<ClassroomId>,
    pub students: usize,
    pub fee_structures: usize,
    pub planned: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub batches: usize,
    pub errors: Vec<FeeSyncBatchError>,
    /// Only filled by the all-classrooms run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classroom_errors: Vec<ClassroomSyncError>,
    pub duration_ms: u64,
}

impl FeeSyncReport {
    /// Folds another report into this one. Used by the all-classrooms run.
    pub fn absorb(&mut self, other: FeeSyncReport) {
        let offset = self.batches;
        self.students += other.students;
        self.fee_structures += other.fee_structures;
        self.planned += other.planned;
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
        self.batches += other.batches;
        self.duration_ms += other.duration_ms;
        self.errors
            .extend(other.errors.into_iter().map(|mut e| {
                e.batch += offset;
                e
            }));
        self.classroom_errors.extend(other.classroom_errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_status_from_amounts() {
        assert_eq!(FeeStatus::from_amounts(10_000, 0), FeeStatus::Unpaid);
        assert_eq!(FeeStatus::from_amounts(10_000, 2_500), FeeStatus::Partial);
        assert_eq!(FeeStatus::from_amounts(10_000, 10_000), FeeStatus::Paid);
        assert_eq!(FeeStatus::from_amounts(8_000, 10_000), FeeStatus::Paid);
        assert_eq!(FeeStatus::from_amounts(0, 0), FeeStatus::Paid);
    }

    #[test]
    fn test_payment_method_wire_format() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
            r#""bank_transfer""#
        );
    }

    #[test]
    fn test_payment_must_be_positive() {
        let dto = RecordPaymentDto {
            amount: 0,
            method: PaymentMethod::Cash,
            reference: None,
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_report_absorb_offsets_batches() {
        let mut total = FeeSyncReport {
            batches: 2,
            created: 3,
            ..Default::default()
        };
        total.absorb(FeeSyncReport {
            batches: 1,
            created: 1,
            failed: 4,
            errors: vec![FeeSyncBatchError {
                batch: 0,
                operations: 4,
                error: "boom".into(),
            }],
            classroom_errors: vec![ClassroomSyncError {
                classroom_id: ClassroomId::new(),
                error: "pool timed out".into(),
            }],
            ..Default::default()
        });
        assert_eq!(total.batches, 3);
        assert_eq!(total.created, 4);
        assert_eq!(total.errors[0].batch, 2);
        assert_eq!(total.classroom_errors.len(), 1);
    }
}
