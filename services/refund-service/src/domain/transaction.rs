use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Jenis transaksi lokal yang bisa memiliki payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    Token,
    ReservationToken,
    InstallmentPlan,
}

impl TransactionKind {
    /// Fixed lookup order used by the locator.
    pub const PRIORITY: [TransactionKind; 3] = [
        TransactionKind::Token,
        TransactionKind::ReservationToken,
        TransactionKind::InstallmentPlan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Token => "token",
            TransactionKind::ReservationToken => "reservation-token",
            TransactionKind::InstallmentPlan => "installment-plan",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Tipe transaksi yang disimpan di refund record (termasuk orphan)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "varchar", rename_all = "kebab-case")]
pub enum TransactionType {
    Token,
    ReservationToken,
    InstallmentPlan,
    Unknown,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Token => "token",
            TransactionType::ReservationToken => "reservation-token",
            TransactionType::InstallmentPlan => "installment-plan",
            TransactionType::Unknown => "unknown",
        }
    }
}

impl From<TransactionKind> for TransactionType {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Token => TransactionType::Token,
            TransactionKind::ReservationToken => TransactionType::ReservationToken,
            TransactionKind::InstallmentPlan => TransactionType::InstallmentPlan,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed reference to the local record that owns a gateway payment.
///
/// Installment plans hold one payment per plan year, so the reference names
/// the year entry being refunded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransactionRef {
    Token { id: Uuid },
    ReservationToken { id: Uuid },
    InstallmentPlan { id: Uuid, year: i32 },
}

impl TransactionRef {
    /// Bangun reference dari input caller (type string + id + tahun cicilan)
    pub fn parse(transaction_type: &str, id: Uuid, year: Option<i32>) -> Result<Self, String> {
        match transaction_type {
            "token" => Ok(TransactionRef::Token { id }),
            "reservation-token" => Ok(TransactionRef::ReservationToken { id }),
            "installment-plan" => year
                .map(|year| TransactionRef::InstallmentPlan { id, year })
                .ok_or_else(|| "installment-plan refunds must name the plan year being refunded".to_string()),
            other => Err(format!("Unsupported transaction type: {}", other)),
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            TransactionRef::Token { .. } => TransactionKind::Token,
            TransactionRef::ReservationToken { .. } => TransactionKind::ReservationToken,
            TransactionRef::InstallmentPlan { .. } => TransactionKind::InstallmentPlan,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            TransactionRef::Token { id }
            | TransactionRef::ReservationToken { id }
            | TransactionRef::InstallmentPlan { id, .. } => *id,
        }
    }

    pub fn installment_year(&self) -> Option<i32> {
        match self {
            TransactionRef::InstallmentPlan { year, .. } => Some(*year),
            _ => None,
        }
    }

    /// Kebalikan dari kolom (transaction_type, transaction_id, installment_year) di refund record
    pub fn from_columns(
        transaction_type: TransactionType,
        id: Option<Uuid>,
        year: Option<i32>,
    ) -> Option<Self> {
        let id = id?;
        match transaction_type {
            TransactionType::Token => Some(TransactionRef::Token { id }),
            TransactionType::ReservationToken => Some(TransactionRef::ReservationToken { id }),
            TransactionType::InstallmentPlan => {
                year.map(|year| TransactionRef::InstallmentPlan { id, year })
            }
            TransactionType::Unknown => None,
        }
    }
}

impl std::fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionRef::InstallmentPlan { id, year } => write!(f, "installment-plan:{}#{}", id, year),
            other => write!(f, "{}:{}", other.kind(), other.id()),
        }
    }
}

/// Local record that owns a gateway payment, as seen by the refund core.
#[derive(Debug, Clone, PartialEq)]
pub struct OwningTransaction {
    pub reference: TransactionRef,
    pub user_id: Option<Uuid>,
    pub gateway_payment_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        let id = Uuid::new_v4();
        assert_eq!(
            TransactionRef::parse("token", id, None),
            Ok(TransactionRef::Token { id })
        );
        assert_eq!(
            TransactionRef::parse("reservation-token", id, Some(2024)),
            Ok(TransactionRef::ReservationToken { id })
        );
        assert_eq!(
            TransactionRef::parse("installment-plan", id, Some(2025)),
            Ok(TransactionRef::InstallmentPlan { id, year: 2025 })
        );
        assert!(TransactionRef::parse("installment-plan", id, None).is_err());
        assert!(TransactionRef::parse("subscription", id, None).is_err());
    }

    #[test]
    fn test_columns_round_trip_for_installment() {
        let id = Uuid::new_v4();
        let reference = TransactionRef::InstallmentPlan { id, year: 2023 };
        let rebuilt = TransactionRef::from_columns(
            reference.kind().into(),
            Some(reference.id()),
            reference.installment_year(),
        );
        assert_eq!(rebuilt, Some(reference));
    }

    #[test]
    fn test_orphan_columns_have_no_reference() {
        assert_eq!(TransactionRef::from_columns(TransactionType::Unknown, None, None), None);
        assert_eq!(
            TransactionRef::from_columns(TransactionType::Token, None, None),
            None
        );
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(
            TransactionKind::PRIORITY.map(|k| k.as_str()),
            ["token", "reservation-token", "installment-plan"]
        );
    }
}
