use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::domain::gateway::PaymentStatus;
use crate::domain::refund::RefundStatus;
use crate::gateway::{GatewayError, GatewayErrorKind};
use crate::repositories::StoreError;

// Struktur response error yang konsisten untuk semua endpoint
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Kategori error yang dilihat caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    Gateway,
    Infrastructure,
}

// Enum untuk semua jenis error yang mungkin terjadi di refund service
#[derive(Debug, Error)]
pub enum RefundError {
    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Refund amount {amount} is below the minimum of {minimum}")]
    BelowMinimum { amount: i64, minimum: i64 },

    #[error("Refund amount {requested} exceeds the refundable balance of {available}")]
    ExceedsAvailable { requested: i64, available: i64 },

    // Not found errors
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Refund record not found: {0}")]
    RefundRecordNotFound(String),

    #[error("Owning transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("User not found for transaction {0}")]
    UserNotFound(String),

    // Conflict errors
    #[error("Payment is not captured (current status: {0})")]
    NotCaptured(PaymentStatus),

    #[error("Payment is already fully refunded")]
    AlreadyFullyRefunded,

    #[error("Invalid refund transition: {from} -> {to}")]
    InvalidTransition { from: RefundStatus, to: RefundStatus },

    #[error("A refund for payment {0} is already in progress")]
    RefundInProgress(String),

    // Gateway errors
    #[error("Gateway rejected the refund ({kind}): {detail}")]
    Gateway { kind: GatewayErrorKind, detail: String },

    // Infrastructure errors
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Refund {0} exists at the gateway but is not recorded yet")]
    RefundRecordPending(String),

    #[error("Gateway refund {gateway_refund_id} was created but could not be recorded: {reason}")]
    UnrecordedGatewayRefund { gateway_refund_id: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RefundError {
    pub fn validation(msg: impl Into<String>) -> Self {
        RefundError::Validation(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RefundError::Validation(_)
            | RefundError::BelowMinimum { .. }
            | RefundError::ExceedsAvailable { .. } => ErrorCategory::Validation,
            RefundError::PaymentNotFound(_)
            | RefundError::RefundRecordNotFound(_)
            | RefundError::TransactionNotFound(_)
            | RefundError::UserNotFound(_) => ErrorCategory::NotFound,
            RefundError::NotCaptured(_)
            | RefundError::AlreadyFullyRefunded
            | RefundError::InvalidTransition { .. }
            | RefundError::RefundInProgress(_) => ErrorCategory::Conflict,
            RefundError::Gateway { .. } => ErrorCategory::Gateway,
            RefundError::GatewayUnavailable(_)
            | RefundError::StoreUnavailable(_)
            | RefundError::RefundRecordPending(_)
            | RefundError::UnrecordedGatewayRefund { .. }
            | RefundError::Internal(_) => ErrorCategory::Infrastructure,
        }
    }

    /// Message shown to the caller: verbatim for validation/conflict, translated
    /// for gateway rejections, generic and retryable for infrastructure.
    pub fn user_message(&self) -> String {
        match self {
            RefundError::Gateway { kind, .. } => kind.user_message().to_string(),
            RefundError::UnrecordedGatewayRefund { .. } => {
                "The refund was submitted to the payment gateway but could not be recorded. It has been flagged for reconciliation.".to_string()
            }
            err if err.category() == ErrorCategory::Infrastructure => {
                "The refund service is temporarily unavailable. Please retry.".to_string()
            }
            err => err.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RefundError::GatewayUnavailable(_)
                | RefundError::StoreUnavailable(_)
                | RefundError::RefundRecordPending(_)
        )
    }

    fn error_code(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Validation => "validation_error",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Gateway => "payment_gateway_error",
            ErrorCategory::Infrastructure => "service_unavailable",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Conflict => StatusCode::CONFLICT,
            ErrorCategory::Gateway => StatusCode::BAD_GATEWAY,
            ErrorCategory::Infrastructure => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

// Konversi dari GatewayError ke RefundError
impl From<GatewayError> for RefundError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected { kind, code, description } => RefundError::Gateway {
                kind,
                detail: format!("[{}] {}", code, description),
            },
            GatewayError::NotFound(resource) => RefundError::PaymentNotFound(resource),
            GatewayError::Unavailable(msg) | GatewayError::InvalidResponse(msg) => {
                RefundError::GatewayUnavailable(msg)
            }
            GatewayError::Timeout(after) => {
                RefundError::GatewayUnavailable(format!("timed out after {:?}", after))
            }
        }
    }
}

// Konversi dari StoreError ke RefundError
impl From<StoreError> for RefundError {
    fn from(err: StoreError) -> Self {
        RefundError::StoreUnavailable(err.to_string())
    }
}

// Implementasi IntoResponse untuk RefundError agar bisa langsung digunakan sebagai response di axum
impl IntoResponse for RefundError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self.category() {
            ErrorCategory::Infrastructure | ErrorCategory::Gateway => {
                tracing::error!("Refund error: {}", self);
            }
            _ => tracing::warn!("Refund request rejected: {}", self),
        }

        let details = if cfg!(debug_assertions) && self.category() != ErrorCategory::Validation {
            Some(self.to_string())
        } else {
            None
        };

        let error_response = ErrorResponse {
            error: self.error_code().to_string(),
            message: self.user_message(),
            details,
        };

        (status, Json(error_response)).into_response()
    }
}

// Type alias untuk Result dengan RefundError sebagai error type
pub type RefundResult<T> = Result<T, RefundError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(RefundError::validation("x").category(), ErrorCategory::Validation);
        assert_eq!(
            RefundError::BelowMinimum { amount: 50, minimum: 100 }.category(),
            ErrorCategory::Validation
        );
        assert_eq!(RefundError::PaymentNotFound("pay_1".into()).category(), ErrorCategory::NotFound);
        assert_eq!(RefundError::AlreadyFullyRefunded.category(), ErrorCategory::Conflict);
        assert_eq!(
            RefundError::NotCaptured(PaymentStatus::Authorized).category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            RefundError::StoreUnavailable("db down".into()).category(),
            ErrorCategory::Infrastructure
        );
    }

    #[test]
    fn test_gateway_message_is_translated() {
        let err: RefundError = GatewayError::rejected(
            "BAD_REQUEST_ERROR",
            "Refunds are not supported in test mode for real bank accounts",
        )
        .into();

        assert_eq!(err.category(), ErrorCategory::Gateway);
        assert_eq!(err.user_message(), GatewayErrorKind::TestModeRestricted.user_message());
        assert!(!err.user_message().contains("BAD_REQUEST_ERROR"));
    }

    #[test]
    fn test_infrastructure_message_is_generic() {
        let err: RefundError = GatewayError::Timeout(std::time::Duration::from_secs(30)).into();
        assert!(err.is_retryable());
        assert!(!err.user_message().contains("30"));
    }

    #[test]
    fn test_conflict_message_is_verbatim() {
        let err = RefundError::InvalidTransition {
            from: RefundStatus::Cancelled,
            to: RefundStatus::Cancelled,
        };
        assert_eq!(err.user_message(), "Invalid refund transition: cancelled -> cancelled");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(RefundError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RefundError::RefundRecordNotFound("rfnd_1".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(RefundError::AlreadyFullyRefunded.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            RefundError::Gateway { kind: GatewayErrorKind::Unknown, detail: String::new() }.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RefundError::Internal("boom".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_pending_record_is_retryable() {
        let err = RefundError::RefundRecordPending("rfnd_FP8QHiV938haTz".into());
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.user_message().contains("rfnd_"));
    }
}
