//! Payment gateway adapter: transport and error normalisation only, no
//! business validation.

pub mod classify;
pub mod razorpay;
pub mod signature;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::gateway::{GatewayPayment, GatewayRefund, RefundNotes};

pub use classify::GatewayErrorKind;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway resource not found: {0}")]
    NotFound(String),

    #[error("Gateway rejected request ({kind}): [{code}] {description}")]
    Rejected {
        kind: GatewayErrorKind,
        code: String,
        description: String,
    },

    #[error("Gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Gateway call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Build a rejection from the gateway's structured error fields.
    pub fn rejected(code: impl Into<String>, description: impl Into<String>) -> Self {
        let code = code.into();
        let description = description.into();
        GatewayError::Rejected {
            kind: classify::classify(&code, &description),
            code,
            description,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;

    async fn create_refund(
        &self,
        payment_id: &str,
        amount: i64,
        notes: &RefundNotes,
    ) -> Result<GatewayRefund, GatewayError>;

    async fn fetch_refund(&self, gateway_refund_id: &str) -> Result<GatewayRefund, GatewayError>;

    async fn list_refunds(&self, payment_id: &str) -> Result<Vec<GatewayRefund>, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_is_classified() {
        let err = GatewayError::rejected(
            "BAD_REQUEST_ERROR",
            "Your account does not have enough balance to carry out the refund operation.",
        );
        assert!(matches!(
            err,
            GatewayError::Rejected { kind: GatewayErrorKind::InsufficientBalance, .. }
        ));
    }
}
