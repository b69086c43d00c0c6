use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::transaction::{TransactionRef, TransactionType};

pub const DEFAULT_REFUND_METHOD: &str = "original";

// Status refund lokal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum RefundStatus {
    Initiated,
    Processed,
    Successful,
    Failed,
    Cancelled,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Initiated => "initiated",
            RefundStatus::Processed => "processed",
            RefundStatus::Successful => "successful",
            RefundStatus::Failed => "failed",
            RefundStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefundStatus::Successful | RefundStatus::Failed | RefundStatus::Cancelled
        )
    }

    /// Allowed forward edges. Terminal states have none.
    pub fn can_transition_to(&self, next: RefundStatus) -> bool {
        matches!(
            (self, next),
            (RefundStatus::Initiated, RefundStatus::Processed)
                | (RefundStatus::Initiated, RefundStatus::Failed)
                | (RefundStatus::Initiated, RefundStatus::Cancelled)
                | (RefundStatus::Processed, RefundStatus::Successful)
                | (RefundStatus::Processed, RefundStatus::Failed)
        )
    }
}

impl std::str::FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(RefundStatus::Initiated),
            "processed" => Ok(RefundStatus::Processed),
            "successful" => Ok(RefundStatus::Successful),
            "failed" => Ok(RefundStatus::Failed),
            "cancelled" => Ok(RefundStatus::Cancelled),
            other => Err(format!("Invalid refund status: {}", other)),
        }
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Audit record of one refund. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct RefundRecord {
    pub id: Uuid,
    pub refund_id: String,
    pub gateway_refund_id: String,

    // Referensi gateway
    pub original_payment_id: String,
    pub original_order_id: Option<String>,

    pub refund_amount: i64,
    pub refund_status: RefundStatus,

    // Pemilik transaksi (null untuk orphan refund)
    pub user_id: Option<Uuid>,
    pub transaction_type: TransactionType,
    pub transaction_id: Option<Uuid>,
    pub installment_year: Option<i32>,

    pub refund_reason: String,
    pub refunded_by: Uuid,
    pub refund_method: String,
    pub note: Option<String>,

    // Lifecycle timestamps
    pub initiated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefundRecord {
    /// Generate refund ID lokal yang unik
    pub fn generate_refund_id(now: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("REF-{}-{}", now.format("%Y%m%d"), &suffix[..12].to_uppercase())
    }

    pub fn transaction_ref(&self) -> Option<TransactionRef> {
        TransactionRef::from_columns(self.transaction_type, self.transaction_id, self.installment_year)
    }

    pub fn is_orphan(&self) -> bool {
        self.transaction_type == TransactionType::Unknown
    }

    /// Apply one legal transition and stamp the matching lifecycle timestamps.
    ///
    /// `processed` sets both `processed_at` and `completed_at`, `failed` sets
    /// `processed_at`, `successful` fills `completed_at` if still empty.
    /// Timestamps already set are never overwritten.
    pub fn apply_transition(&mut self, next: RefundStatus, now: DateTime<Utc>) -> Result<(), (RefundStatus, RefundStatus)> {
        if !self.refund_status.can_transition_to(next) {
            return Err((self.refund_status, next));
        }

        match next {
            RefundStatus::Processed => {
                self.processed_at.get_or_insert(now);
                self.completed_at.get_or_insert(now);
            }
            RefundStatus::Failed => {
                self.processed_at.get_or_insert(now);
            }
            RefundStatus::Successful => {
                self.processed_at.get_or_insert(now);
                self.completed_at.get_or_insert(now);
            }
            RefundStatus::Cancelled | RefundStatus::Initiated => {}
        }

        self.refund_status = next;
        self.updated_at = now;
        Ok(())
    }

    pub fn sub_state(&self) -> RefundSubState {
        RefundSubState {
            refund_id: self.refund_id.clone(),
            refund_amount: self.refund_amount,
            refund_status: self.refund_status,
            initiated_at: self.initiated_at,
            processed_at: self.processed_at,
            completed_at: self.completed_at,
            refund_reason: self.refund_reason.clone(),
            refunded_by: self.refunded_by,
        }
    }
}

/// Refund fields mirrored onto the owning transaction (JSONB `refund` column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundSubState {
    pub refund_id: String,
    pub refund_amount: i64,
    pub refund_status: RefundStatus,
    pub initiated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub refund_reason: String,
    pub refunded_by: Uuid,
}

// Filter untuk listing refund
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefundFilter {
    pub status: Option<RefundStatus>,
    pub user_id: Option<Uuid>,
    pub original_payment_id: Option<String>,
}

impl RefundFilter {
    pub fn matches(&self, record: &RefundRecord) -> bool {
        self.status.map_or(true, |s| record.refund_status == s)
            && self.user_id.map_or(true, |u| record.user_id == Some(u))
            && self
                .original_payment_id
                .as_deref()
                .map_or(true, |p| record.original_payment_id == p)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefundSort {
    #[default]
    CreatedAtDesc,
    CreatedAtAsc,
}

impl RefundSort {
    pub fn sql(&self) -> &'static str {
        match self {
            RefundSort::CreatedAtDesc => "created_at DESC, id DESC",
            RefundSort::CreatedAtAsc => "created_at ASC, id ASC",
        }
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page request, clamped: page >= 1, 1 <= page_size <= 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let total_pages = total.div_ceil(u64::from(request.page_size)) as u32;
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
            total_pages,
            has_next: request.page < total_pages,
            has_prev: request.page > 1,
        }
    }
}
