use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use crate::domain::refund::RefundSubState;
use crate::domain::transaction::{OwningTransaction, TransactionKind, TransactionRef};
use crate::repositories::StoreError;

/// Capability shared by every local transaction kind that can own a gateway payment.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    fn kind(&self) -> TransactionKind;

    async fn find_by_gateway_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<OwningTransaction>, StoreError>;

    async fn find_by_id(&self, reference: &TransactionRef) -> Result<Option<OwningTransaction>, StoreError>;

    /// Overwrite the embedded refund sub-state. Returns false when the record is gone.
    async fn update_refund_sub_state(
        &self,
        reference: &TransactionRef,
        sub_state: &RefundSubState,
    ) -> Result<bool, StoreError>;
}

#[derive(Debug, FromRow)]
struct TokenRow {
    id: Uuid,
    user_id: Option<Uuid>,
    gateway_payment_id: Option<String>,
}

/// Prepayment tokens and reservation tokens share one table shape.
#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
    kind: TransactionKind,
    table: &'static str,
}

impl PgTokenStore {
    pub fn prepayment(pool: PgPool) -> Self {
        Self {
            pool,
            kind: TransactionKind::Token,
            table: "prepayment_tokens",
        }
    }

    pub fn reservation(pool: PgPool) -> Self {
        Self {
            pool,
            kind: TransactionKind::ReservationToken,
            table: "reservation_tokens",
        }
    }

    fn to_transaction(&self, row: TokenRow) -> OwningTransaction {
        let reference = match self.kind {
            TransactionKind::ReservationToken => TransactionRef::ReservationToken { id: row.id },
            _ => TransactionRef::Token { id: row.id },
        };

        OwningTransaction {
            reference,
            user_id: row.user_id,
            gateway_payment_id: row.gateway_payment_id,
        }
    }

    // Reference harus sesuai kind store ini
    fn owns(&self, reference: &TransactionRef) -> bool {
        reference.kind() == self.kind
    }
}

#[async_trait]
impl TransactionStore for PgTokenStore {
    fn kind(&self) -> TransactionKind {
        self.kind
    }

    async fn find_by_gateway_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<OwningTransaction>, StoreError> {
        let sql = format!(
            "SELECT id, user_id, gateway_payment_id FROM {} WHERE gateway_payment_id = $1 LIMIT 1",
            self.table
        );

        let row = sqlx::query_as::<_, TokenRow>(&sql)
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| self.to_transaction(row)))
    }

    async fn find_by_id(&self, reference: &TransactionRef) -> Result<Option<OwningTransaction>, StoreError> {
        if !self.owns(reference) {
            return Ok(None);
        }

        let sql = format!(
            "SELECT id, user_id, gateway_payment_id FROM {} WHERE id = $1",
            self.table
        );

        let row = sqlx::query_as::<_, TokenRow>(&sql)
            .bind(reference.id())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| self.to_transaction(row)))
    }

    async fn update_refund_sub_state(
        &self,
        reference: &TransactionRef,
        sub_state: &RefundSubState,
    ) -> Result<bool, StoreError> {
        if !self.owns(reference) {
            return Ok(false);
        }

        let sql = format!("UPDATE {} SET refund = $1 WHERE id = $2", self.table);

        let result = sqlx::query(&sql)
            .bind(Json(sub_state))
            .bind(reference.id())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, FromRow)]
struct InstallmentRow {
    plan_id: Uuid,
    user_id: Option<Uuid>,
    plan_year: i32,
    gateway_payment_id: Option<String>,
}

impl From<InstallmentRow> for OwningTransaction {
    fn from(row: InstallmentRow) -> Self {
        OwningTransaction {
            reference: TransactionRef::InstallmentPlan {
                id: row.plan_id,
                year: row.plan_year,
            },
            user_id: row.user_id,
            gateway_payment_id: row.gateway_payment_id,
        }
    }
}

/// Installment plans: one plan, one payment entry per plan year.
///
/// The refund sub-state lives on the year entry, never on the plan itself.
#[derive(Clone)]
pub struct PgInstallmentPlanStore {
    pool: PgPool,
}

impl PgInstallmentPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PgInstallmentPlanStore {
    fn kind(&self) -> TransactionKind {
        TransactionKind::InstallmentPlan
    }

    async fn find_by_gateway_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<OwningTransaction>, StoreError> {
        let row = sqlx::query_as::<_, InstallmentRow>(
            "SELECT p.id AS plan_id, p.user_id, e.plan_year, e.gateway_payment_id
             FROM installment_entries e
             JOIN installment_plans p ON p.id = e.plan_id
             WHERE e.gateway_payment_id = $1
             LIMIT 1",
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(OwningTransaction::from))
    }

    async fn find_by_id(&self, reference: &TransactionRef) -> Result<Option<OwningTransaction>, StoreError> {
        let TransactionRef::InstallmentPlan { id, year } = *reference else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, InstallmentRow>(
            "SELECT p.id AS plan_id, p.user_id, e.plan_year, e.gateway_payment_id
             FROM installment_entries e
             JOIN installment_plans p ON p.id = e.plan_id
             WHERE p.id = $1 AND e.plan_year = $2",
        )
        .bind(id)
        .bind(year)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(OwningTransaction::from))
    }

    async fn update_refund_sub_state(
        &self,
        reference: &TransactionRef,
        sub_state: &RefundSubState,
    ) -> Result<bool, StoreError> {
        let TransactionRef::InstallmentPlan { id, year } = *reference else {
            return Ok(false);
        };

        // Update tepat satu entry tahun yang direfund
        let result = sqlx::query(
            "UPDATE installment_entries SET refund = $1 WHERE plan_id = $2 AND plan_year = $3",
        )
        .bind(Json(sub_state))
        .bind(id)
        .bind(year)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
