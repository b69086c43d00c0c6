use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::refund::{PageRequest, RefundFilter, RefundRecord, RefundSort, RefundStatus};
use crate::repositories::StoreError;

/// Persistence port for the refund ledger.
#[async_trait]
pub trait RefundStore: Send + Sync {
    async fn create(&self, record: &RefundRecord) -> Result<RefundRecord, StoreError>;

    async fn find_by_refund_id(&self, refund_id: &str) -> Result<Option<RefundRecord>, StoreError>;

    async fn find_by_gateway_refund_id(
        &self,
        gateway_refund_id: &str,
    ) -> Result<Option<RefundRecord>, StoreError>;

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Vec<RefundRecord>, StoreError>;

    /// Returns the requested page and the total number of matching records.
    async fn find_many(
        &self,
        filter: &RefundFilter,
        sort: RefundSort,
        page: PageRequest,
    ) -> Result<(Vec<RefundRecord>, u64), StoreError>;

    /// Compare-and-set: writes the record only while the stored status still
    /// equals `expected`. Returns false when another writer got there first.
    async fn update_status(&self, record: &RefundRecord, expected: RefundStatus) -> Result<bool, StoreError>;

    /// True when an `initiated` refund already exists for the payment.
    async fn has_open_refund(&self, payment_id: &str) -> Result<bool, StoreError>;
}

// Repository refund ledger di PostgreSQL
#[derive(Clone)]
pub struct PgRefundRepository {
    pool: PgPool,
}

impl PgRefundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Filter opsional: NULL berarti tidak difilter
const FILTER_CLAUSE: &str = "($1::varchar IS NULL OR refund_status = $1)
    AND ($2::uuid IS NULL OR user_id = $2)
    AND ($3::varchar IS NULL OR original_payment_id = $3)";

#[async_trait]
impl RefundStore for PgRefundRepository {
    async fn create(&self, record: &RefundRecord) -> Result<RefundRecord, StoreError> {
        let created = sqlx::query_as::<_, RefundRecord>(
            "INSERT INTO refunds (
                id, refund_id, gateway_refund_id, original_payment_id, original_order_id,
                refund_amount, refund_status, user_id, transaction_type, transaction_id,
                installment_year, refund_reason, refunded_by, refund_method, note,
                initiated_at, processed_at, completed_at, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
            ) RETURNING *",
        )
        .bind(record.id)
        .bind(&record.refund_id)
        .bind(&record.gateway_refund_id)
        .bind(&record.original_payment_id)
        .bind(&record.original_order_id)
        .bind(record.refund_amount)
        .bind(record.refund_status)
        .bind(record.user_id)
        .bind(record.transaction_type)
        .bind(record.transaction_id)
        .bind(record.installment_year)
        .bind(&record.refund_reason)
        .bind(record.refunded_by)
        .bind(&record.refund_method)
        .bind(&record.note)
        .bind(record.initiated_at)
        .bind(record.processed_at)
        .bind(record.completed_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_refund_id(&self, refund_id: &str) -> Result<Option<RefundRecord>, StoreError> {
        let record = sqlx::query_as::<_, RefundRecord>("SELECT * FROM refunds WHERE refund_id = $1")
            .bind(refund_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn find_by_gateway_refund_id(
        &self,
        gateway_refund_id: &str,
    ) -> Result<Option<RefundRecord>, StoreError> {
        let record = sqlx::query_as::<_, RefundRecord>("SELECT * FROM refunds WHERE gateway_refund_id = $1")
            .bind(gateway_refund_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Vec<RefundRecord>, StoreError> {
        let records = sqlx::query_as::<_, RefundRecord>(
            "SELECT * FROM refunds WHERE original_payment_id = $1 ORDER BY created_at ASC",
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn find_many(
        &self,
        filter: &RefundFilter,
        sort: RefundSort,
        page: PageRequest,
    ) -> Result<(Vec<RefundRecord>, u64), StoreError> {
        let items_sql = format!(
            "SELECT * FROM refunds WHERE {} ORDER BY {} LIMIT $4 OFFSET $5",
            FILTER_CLAUSE,
            sort.sql()
        );

        let items = sqlx::query_as::<_, RefundRecord>(&items_sql)
            .bind(filter.status)
            .bind(filter.user_id)
            .bind(&filter.original_payment_id)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        // Hitung total untuk pagination metadata
        let count_sql = format!("SELECT COUNT(*) FROM refunds WHERE {}", FILTER_CLAUSE);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.status)
            .bind(filter.user_id)
            .bind(&filter.original_payment_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((items, total.max(0) as u64))
    }

    async fn update_status(&self, record: &RefundRecord, expected: RefundStatus) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE refunds
             SET refund_status = $1, processed_at = $2, completed_at = $3, note = $4, updated_at = $5
             WHERE refund_id = $6 AND refund_status = $7",
        )
        .bind(record.refund_status)
        .bind(record.processed_at)
        .bind(record.completed_at)
        .bind(&record.note)
        .bind(record.updated_at)
        .bind(&record.refund_id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn has_open_refund(&self, payment_id: &str) -> Result<bool, StoreError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM refunds WHERE original_payment_id = $1 AND refund_status = $2)",
        )
        .bind(payment_id)
        .bind(RefundStatus::Initiated)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }
}
