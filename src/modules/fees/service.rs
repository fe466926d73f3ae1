use anyhow::anyhow;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument, warn};

use classdesk_config::FeeSyncConfig;
use classdesk_core::{AppError, Paginated, PaginationParams};
use classdesk_models::fees::{
    CreateFeeStructureDto, FeePayment, FeeStatus, FeeStructure, FeeStructureFilterParams,
    FeeVerification, PaymentReceipt, RecordPaymentDto, StudentFee, StudentFeeDetails,
    StudentFeeLedger, UpdateFeeStructureDto,
};
use classdesk_models::ids::{FeeStructureId, StudentFeeId, StudentId, TermId, UserId};
use classdesk_models::value_types::FeePin;

use crate::modules::classrooms::service::ClassroomService;
use crate::modules::fees::sync::FeeSyncService;

const STRUCTURE_COLUMNS: &str = "id, name, classroom_id, term_id, amount, due_date, description, \
     is_active, created_at, updated_at";

const STUDENT_FEE_COLUMNS: &str = "sf.id, sf.student_id, sf.fee_structure_id, sf.amount, \
     sf.amount_paid, sf.status, sf.pin, sf.created_at, sf.updated_at";

const PAYMENT_COLUMNS: &str =
    "id, student_fee_id, amount, method, reference, recorded_by, paid_at";

pub struct FeeService;

impl FeeService {
    /// Creates a structure and bills it to the classroom's students.
    #[instrument(skip(db, config, dto), fields(classroom_id = %dto.classroom_id, amount = dto.amount))]
    pub async fn create_structure(
        db: &PgPool,
        config: &FeeSyncConfig,
        actor: UserId,
        dto: CreateFeeStructureDto,
    ) -> Result<FeeStructure, AppError> {
        ClassroomService::ensure_exists(db, dto.classroom_id).await?;

        let structure = sqlx::query_as::<_, FeeStructure>(&format!(
            r#"INSERT INTO fee_structures (name, classroom_id, term_id, amount, due_date, description)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {STRUCTURE_COLUMNS}"#
        ))
        .bind(dto.name.trim())
        .bind(dto.classroom_id)
        .bind(dto.term_id)
        .bind(dto.amount)
        .bind(dto.due_date)
        .bind(&dto.description)
        .fetch_one(db)
        .await?;

        info!(fee_structure_id = %structure.id, "Fee structure created");

        sync_after_change(db, config, &structure, actor).await;
        Ok(structure)
    }

    #[instrument(skip(db))]
    pub async fn get_structures(
        db: &PgPool,
        filters: FeeStructureFilterParams,
        pagination: PaginationParams,
    ) -> Result<Paginated<FeeStructure>, AppError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM fee_structures");
        push_structure_filters(&mut count_query, &filters);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await?;

        let mut data_query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {STRUCTURE_COLUMNS} FROM fee_structures"
        ));
        push_structure_filters(&mut data_query, &filters);
        data_query.push(" ORDER BY created_at DESC LIMIT ");
        data_query.push_bind(pagination.limit());
        data_query.push(" OFFSET ");
        data_query.push_bind(pagination.offset());

        let structures = data_query
            .build_query_as::<FeeStructure>()
            .fetch_all(db)
            .await?;

        Ok(Paginated::new(structures, total, &pagination))
    }

    #[instrument(skip(db))]
    pub async fn get_structure(db: &PgPool, id: FeeStructureId) -> Result<FeeStructure, AppError> {
        sqlx::query_as::<_, FeeStructure>(&format!(
            "SELECT {STRUCTURE_COLUMNS} FROM fee_structures WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Fee structure not found")))
    }

    /// Updates a structure. If it is active afterwards, amount changes are
    /// pushed to the fee records already billed.
    #[instrument(skip(db, config, dto))]
    pub async fn update_structure(
        db: &PgPool,
        config: &FeeSyncConfig,
        actor: UserId,
        id: FeeStructureId,
        dto: UpdateFeeStructureDto,
    ) -> Result<FeeStructure, AppError> {
        let structure = sqlx::query_as::<_, FeeStructure>(&format!(
            r#"UPDATE fee_structures
               SET name = COALESCE($2, name),
                   term_id = CASE WHEN $8 THEN $3 ELSE term_id END,
                   amount = COALESCE($4, amount),
                   due_date = CASE WHEN $9 THEN $5 ELSE due_date END,
                   description = CASE WHEN $10 THEN $6 ELSE description END,
                   is_active = COALESCE($7, is_active),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {STRUCTURE_COLUMNS}"#
        ))
        .bind(id)
        .bind(dto.name.as_deref().map(str::trim))
        .bind(dto.term_id.flatten())
        .bind(dto.amount)
        .bind(dto.due_date.flatten())
        .bind(dto.description.as_ref().and_then(Option::as_deref))
        .bind(dto.is_active)
        .bind(dto.term_id.is_some())
        .bind(dto.due_date.is_some())
        .bind(dto.description.is_some())
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Fee structure not found")))?;

        sync_after_change(db, config, &structure, actor).await;
        Ok(structure)
    }

    /// Structures with recorded payments cannot be deleted; deactivate
    /// them instead.
    #[instrument(skip(db))]
    pub async fn delete_structure(db: &PgPool, id: FeeStructureId) -> Result<(), AppError> {
        let has_payments = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(
                SELECT 1 FROM fee_payments p
                JOIN student_fees sf ON sf.id = p.student_fee_id
                WHERE sf.fee_structure_id = $1
            )"#,
        )
        .bind(id)
        .fetch_one(db)
        .await?;

        if has_payments {
            return Err(AppError::bad_request(anyhow!(
                "Fee structure has recorded payments; deactivate it instead"
            )));
        }

        let result = sqlx::query("DELETE FROM fee_structures WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow!("Fee structure not found")));
        }

        Ok(())
    }

    /// Every fee billed to the student, optionally limited to one term.
    #[instrument(skip(db))]
    pub async fn get_student_ledger(
        db: &PgPool,
        student_id: StudentId,
        term_id: Option<TermId>,
    ) -> Result<StudentFeeLedger, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM students WHERE id = $1)",
        )
        .bind(student_id)
        .fetch_one(db)
        .await?;
        if !exists {
            return Err(AppError::not_found(anyhow!("Student not found")));
        }

        let fees = sqlx::query_as::<_, StudentFeeDetails>(&format!(
            r#"SELECT {STUDENT_FEE_COLUMNS},
                      fs.name AS fee_name, fs.term_id, fs.due_date,
                      sf.amount - sf.amount_paid AS balance
               FROM student_fees sf
               JOIN fee_structures fs ON fs.id = sf.fee_structure_id
               WHERE sf.student_id = $1 AND ($2::uuid IS NULL OR fs.term_id = $2)
               ORDER BY fs.due_date NULLS LAST, fs.name"#
        ))
        .bind(student_id)
        .bind(term_id)
        .fetch_all(db)
        .await?;

        Ok(StudentFeeLedger::new(student_id, fees))
    }

    /// Records a payment against a student fee. The fee row is locked so
    /// concurrent payments cannot overshoot the amount.
    #[instrument(skip(db, dto), fields(amount = dto.amount))]
    pub async fn record_payment(
        db: &PgPool,
        recorded_by: UserId,
        student_fee_id: StudentFeeId,
        dto: RecordPaymentDto,
    ) -> Result<PaymentReceipt, AppError> {
        let mut tx = db.begin().await?;

        let fee = sqlx::query_as::<_, StudentFee>(&format!(
            "SELECT {STUDENT_FEE_COLUMNS} FROM student_fees sf WHERE sf.id = $1 FOR UPDATE"
        ))
        .bind(student_fee_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Student fee not found")))?;

        let (amount_paid, status) = apply_payment(fee.amount, fee.amount_paid, dto.amount)
            .map_err(|msg| AppError::bad_request(anyhow!(msg)))?;

        let student_fee = sqlx::query_as::<_, StudentFee>(
            r#"UPDATE student_fees
               SET amount_paid = $2, status = $3, updated_at = NOW()
               WHERE id = $1
               RETURNING id, student_id, fee_structure_id, amount, amount_paid, status, pin,
                         created_at, updated_at"#,
        )
        .bind(student_fee_id)
        .bind(amount_paid)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        let payment = sqlx::query_as::<_, FeePayment>(&format!(
            r#"INSERT INTO fee_payments (student_fee_id, amount, method, reference, recorded_by)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {PAYMENT_COLUMNS}"#
        ))
        .bind(student_fee_id)
        .bind(dto.amount)
        .bind(dto.method)
        .bind(&dto.reference)
        .bind(recorded_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            student_fee_id = %student_fee_id,
            payment_id = %payment.id,
            status = ?student_fee.status,
            "Fee payment recorded"
        );

        Ok(PaymentReceipt {
            payment,
            student_fee,
        })
    }

    #[instrument(skip(db))]
    pub async fn get_payments(
        db: &PgPool,
        student_fee_id: StudentFeeId,
    ) -> Result<Vec<FeePayment>, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM student_fees WHERE id = $1)",
        )
        .bind(student_fee_id)
        .fetch_one(db)
        .await?;
        if !exists {
            return Err(AppError::not_found(anyhow!("Student fee not found")));
        }

        let payments = sqlx::query_as::<_, FeePayment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM fee_payments WHERE student_fee_id = $1 ORDER BY paid_at DESC"
        ))
        .bind(student_fee_id)
        .fetch_all(db)
        .await?;

        Ok(payments)
    }

    /// Looks up a student fee by the PIN printed on its receipt.
    #[instrument(skip(db, pin))]
    pub async fn verify_pin(db: &PgPool, pin: &str) -> Result<FeeVerification, AppError> {
        let pin = FeePin::new(pin).map_err(AppError::bad_request)?;

        sqlx::query_as::<_, FeeVerification>(&format!(
            r#"SELECT {STUDENT_FEE_COLUMNS},
                      fs.name AS fee_name, fs.term_id, fs.due_date,
                      sf.amount - sf.amount_paid AS balance,
                      u.first_name || ' ' || u.last_name AS student_name,
                      s.admission_number
               FROM student_fees sf
               JOIN fee_structures fs ON fs.id = sf.fee_structure_id
               JOIN students s ON s.id = sf.student_id
               JOIN users u ON u.id = s.user_id
               WHERE sf.pin = $1"#
        ))
        .bind(&pin)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("No fee matches this PIN")))
    }
}

/// New `(amount_paid, status)` after paying `payment` towards a fee of
/// `amount` of which `paid` is already settled.
pub fn apply_payment(amount: i64, paid: i64, payment: i64) -> Result<(i64, FeeStatus), String> {
    if payment <= 0 {
        return Err("Payment amount must be positive".to_string());
    }
    let outstanding = (amount - paid).max(0);
    if payment > outstanding {
        return Err(format!(
            "Payment of {} exceeds the outstanding balance of {}",
            payment, outstanding
        ));
    }
    let amount_paid = paid + payment;
    Ok((amount_paid, FeeStatus::from_amounts(amount, amount_paid)))
}

/// The structure is saved already, so a failed sync is logged and picked
/// up by the next run.
async fn sync_after_change(
    db: &PgPool,
    config: &FeeSyncConfig,
    structure: &FeeStructure,
    actor: UserId,
) {
    if !structure.is_active {
        return;
    }
    if let Err(e) =
        FeeSyncService::sync_classroom(db, config, structure.classroom_id, Some(actor)).await
    {
        warn!(fee_structure_id = %structure.id, error = %e, "Fee sync after structure change failed");
    }
}

fn push_structure_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    filters: &FeeStructureFilterParams,
) {
    builder.push(" WHERE 1=1");

    if let Some(classroom_id) = filters.classroom_id {
        builder.push(" AND classroom_id = ");
        builder.push_bind(classroom_id);
    }
    if let Some(term_id) = filters.term_id {
        builder.push(" AND term_id = ");
        builder.push_bind(term_id);
    }
    if let Some(is_active) = filters.is_active {
        builder.push(" AND is_active = ");
        builder.push_bind(is_active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_then_full_payment() {
        let (paid, status) = apply_payment(50_000, 0, 20_000).unwrap();
        assert_eq!((paid, status), (20_000, FeeStatus::Partial));

        let (paid, status) = apply_payment(50_000, paid, 30_000).unwrap();
        assert_eq!((paid, status), (50_000, FeeStatus::Paid));
    }

    #[test]
    fn test_overpayment_is_rejected() {
        let err = apply_payment(50_000, 45_000, 10_000).unwrap_err();
        assert_eq!(
            err,
            "Payment of 10000 exceeds the outstanding balance of 5000"
        );
    }

    #[test]
    fn test_settled_fee_takes_no_more_payments() {
        assert!(apply_payment(10_000, 10_000, 1).is_err());
    }

    #[test]
    fn test_non_positive_payment_is_rejected() {
        assert!(apply_payment(10_000, 0, 0).is_err());
    }
}
