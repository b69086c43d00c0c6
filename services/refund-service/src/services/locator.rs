use std::sync::Arc;

use crate::domain::refund::RefundSubState;
use crate::domain::transaction::{OwningTransaction, TransactionKind, TransactionRef};
use crate::repositories::{StoreError, TransactionStore};

/// Finds the local record that owns a gateway payment across every transaction kind.
#[derive(Clone)]
pub struct TransactionLocator {
    // Urut sesuai TransactionKind::PRIORITY
    stores: [Arc<dyn TransactionStore>; 3],
}

impl TransactionLocator {
    pub fn new(
        tokens: Arc<dyn TransactionStore>,
        reservation_tokens: Arc<dyn TransactionStore>,
        installment_plans: Arc<dyn TransactionStore>,
    ) -> Self {
        Self {
            stores: [tokens, reservation_tokens, installment_plans],
        }
    }

    fn store_for(&self, kind: TransactionKind) -> Option<&Arc<dyn TransactionStore>> {
        self.stores.iter().find(|store| store.kind() == kind)
    }

    /// Try each kind in priority order, first match wins.
    ///
    /// `Ok(None)` is the expected answer when the local record was deleted;
    /// only infrastructure failures are errors.
    pub async fn locate(&self, payment_id: &str) -> Result<Option<OwningTransaction>, StoreError> {
        for kind in TransactionKind::PRIORITY {
            let Some(store) = self.store_for(kind) else {
                continue;
            };

            if let Some(found) = store.find_by_gateway_payment_id(payment_id).await? {
                tracing::debug!(%payment_id, transaction = %found.reference, "Owning transaction located");
                return Ok(Some(found));
            }
        }

        tracing::debug!(%payment_id, "No local transaction references this payment");
        Ok(None)
    }

    /// Load a caller-supplied reference from the store of its kind.
    pub async fn resolve(&self, reference: &TransactionRef) -> Result<Option<OwningTransaction>, StoreError> {
        match self.store_for(reference.kind()) {
            Some(store) => store.find_by_id(reference).await,
            None => Ok(None),
        }
    }

    pub async fn update_sub_state(
        &self,
        reference: &TransactionRef,
        sub_state: &RefundSubState,
    ) -> Result<bool, StoreError> {
        match self.store_for(reference.kind()) {
            Some(store) => store.update_refund_sub_state(reference, sub_state).await,
            None => Ok(false),
        }
    }
}
