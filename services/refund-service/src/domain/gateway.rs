// Model data milik payment gateway (read-only untuk service ini)
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Status payment di gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Authorized,
    Captured,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment as reported by the gateway. Amounts are in minor units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayPayment {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    pub amount: i64,
    #[serde(default)]
    pub amount_refunded: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
}

fn default_currency() -> String {
    "INR".to_string()
}

impl GatewayPayment {
    /// Sisa amount yang masih bisa direfund
    pub fn refundable_amount(&self) -> i64 {
        self.amount - self.amount_refunded
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

// Status refund di gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GatewayRefundStatus {
    Pending,
    Processed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl GatewayRefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayRefundStatus::Pending => "pending",
            GatewayRefundStatus::Processed => "processed",
            GatewayRefundStatus::Failed => "failed",
            GatewayRefundStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AcquirerData {
    #[serde(default)]
    pub arn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayRefund {
    pub id: String,
    pub payment_id: String,
    pub amount: i64,
    pub status: GatewayRefundStatus,
    /// Gateway returns `[]` instead of `{}` when a refund carries no notes.
    #[serde(default)]
    pub notes: serde_json::Value,
    #[serde(default)]
    pub acquirer_data: Option<AcquirerData>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

impl GatewayRefund {
    /// Acquirer reference number, present once the bank has settled the refund
    pub fn settlement_reference(&self) -> Option<&str> {
        self.acquirer_data
            .as_ref()
            .and_then(|data| data.arn.as_deref())
            .filter(|arn| !arn.is_empty())
    }
}

// Notes yang dikirim bersama create refund
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundNotes {
    pub reason: String,
    #[serde(rename = "refundedBy")]
    pub refunded_by: String,
}

impl RefundNotes {
    pub fn to_map(&self) -> HashMap<String, String> {
        HashMap::from([
            ("reason".to_string(), self.reason.clone()),
            ("refundedBy".to_string(), self.refunded_by.clone()),
        ])
    }
}

// Envelope webhook dari gateway
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub refund: Option<WebhookEntity>,
}

/// Gateway wraps each entity as `{"entity": {...}}`; a bare `{"id": ..}` is accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WebhookEntity {
    Wrapped { entity: WebhookRefundRef },
    Bare(WebhookRefundRef),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookRefundRef {
    pub id: String,
}

impl WebhookEnvelope {
    pub const REFUND_PROCESSED: &'static str = "refund.processed";

    pub fn refund_id(&self) -> Option<&str> {
        self.payload.refund.as_ref().map(|entity| match entity {
            WebhookEntity::Wrapped { entity } => entity.id.as_str(),
            WebhookEntity::Bare(refund) => refund.id.as_str(),
        })
    }
}
