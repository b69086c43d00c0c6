pub mod refund_repo;
pub mod transaction_repo;

#[cfg(test)]
pub mod in_memory;

use thiserror::Error;

pub use refund_repo::{PgRefundRepository, RefundStore};
pub use transaction_repo::{PgInstallmentPlanStore, PgTokenStore, TransactionStore};

// Error dari layer persistence
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::Duplicate(db_err.message().to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
                StoreError::Corrupted(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupted(format!("Invalid refund sub-state: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_unavailable() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_decode_errors_are_corrupted() {
        let err: StoreError = sqlx::Error::ColumnNotFound("refund_status".to_string()).into();
        assert!(matches!(err, StoreError::Corrupted(_)));
    }
}
