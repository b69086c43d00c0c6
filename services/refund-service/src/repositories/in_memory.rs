//! Thread-safe in-memory stores backing the service tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::refund::{PageRequest, RefundFilter, RefundRecord, RefundSort, RefundStatus, RefundSubState};
use crate::domain::transaction::{OwningTransaction, TransactionKind, TransactionRef};
use crate::repositories::{RefundStore, StoreError, TransactionStore};

#[derive(Default, Clone)]
pub struct InMemoryRefundStore {
    records: Arc<RwLock<HashMap<String, RefundRecord>>>,
    failing_creates: Arc<AtomicU32>,
    create_calls: Arc<AtomicU32>,
    create_delay: Arc<std::sync::Mutex<Duration>>,
}

impl InMemoryRefundStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls to `create` fail as unavailable.
    pub fn fail_next_creates(&self, count: u32) {
        self.failing_creates.store(count, Ordering::SeqCst);
    }

    /// Slow down every `create`, to simulate a lagging database.
    pub fn delay_creates(&self, delay: Duration) {
        if let Ok(mut current) = self.create_delay.lock() {
            *current = delay;
        }
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub async fn insert(&self, record: RefundRecord) {
        self.records.write().await.insert(record.refund_id.clone(), record);
    }

    pub async fn get(&self, refund_id: &str) -> Option<RefundRecord> {
        self.records.read().await.get(refund_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RefundStore for InMemoryRefundStore {
    async fn create(&self, record: &RefundRecord) -> Result<RefundRecord, StoreError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.create_delay.lock().map(|d| *d).unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failing = self.failing_creates.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_creates.store(failing - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }

        let mut records = self.records.write().await;
        if records.contains_key(&record.refund_id)
            || records.values().any(|r| r.gateway_refund_id == record.gateway_refund_id)
        {
            return Err(StoreError::Duplicate(record.refund_id.clone()));
        }
        records.insert(record.refund_id.clone(), record.clone());
        Ok(record.clone())
    }

    async fn find_by_refund_id(&self, refund_id: &str) -> Result<Option<RefundRecord>, StoreError> {
        Ok(self.get(refund_id).await)
    }

    async fn find_by_gateway_refund_id(
        &self,
        gateway_refund_id: &str,
    ) -> Result<Option<RefundRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.gateway_refund_id == gateway_refund_id)
            .cloned())
    }

    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Vec<RefundRecord>, StoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<RefundRecord> = records
            .values()
            .filter(|r| r.original_payment_id == payment_id)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.created_at);
        Ok(matching)
    }

    async fn find_many(
        &self,
        filter: &RefundFilter,
        sort: RefundSort,
        page: PageRequest,
    ) -> Result<(Vec<RefundRecord>, u64), StoreError> {
        let records = self.records.read().await;
        let mut matching: Vec<RefundRecord> = records.values().filter(|r| filter.matches(r)).cloned().collect();

        matching.sort_by(|a, b| match sort {
            RefundSort::CreatedAtDesc => b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)),
            RefundSort::CreatedAtAsc => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();

        Ok((items, total))
    }

    async fn update_status(&self, record: &RefundRecord, expected: RefundStatus) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.refund_id) {
            Some(stored) if stored.refund_status == expected => {
                *stored = record.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn has_open_refund(&self, payment_id: &str) -> Result<bool, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .any(|r| r.original_payment_id == payment_id && r.refund_status == RefundStatus::Initiated))
    }
}

#[derive(Debug, Clone)]
pub struct StoredTransaction {
    pub transaction: OwningTransaction,
    pub sub_state: Option<RefundSubState>,
}

#[derive(Clone)]
pub struct InMemoryTransactionStore {
    kind: TransactionKind,
    transactions: Arc<RwLock<HashMap<TransactionRef, StoredTransaction>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryTransactionStore {
    pub fn new(kind: TransactionKind) -> Self {
        Self {
            kind,
            transactions: Arc::default(),
            unavailable: Arc::default(),
        }
    }

    pub async fn insert(&self, reference: TransactionRef, user_id: Option<Uuid>, payment_id: &str) {
        let transaction = OwningTransaction {
            reference,
            user_id,
            gateway_payment_id: Some(payment_id.to_string()),
        };
        self.transactions.write().await.insert(
            reference,
            StoredTransaction {
                transaction,
                sub_state: None,
            },
        );
    }

    pub async fn sub_state(&self, reference: &TransactionRef) -> Option<RefundSubState> {
        self.transactions
            .read()
            .await
            .get(reference)
            .and_then(|stored| stored.sub_state.clone())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{} store offline", self.kind)));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    fn kind(&self) -> TransactionKind {
        self.kind
    }

    async fn find_by_gateway_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<OwningTransaction>, StoreError> {
        self.check_available()?;
        let transactions = self.transactions.read().await;
        Ok(transactions
            .values()
            .find(|stored| stored.transaction.gateway_payment_id.as_deref() == Some(payment_id))
            .map(|stored| stored.transaction.clone()))
    }

    async fn find_by_id(&self, reference: &TransactionRef) -> Result<Option<OwningTransaction>, StoreError> {
        self.check_available()?;
        let transactions = self.transactions.read().await;
        Ok(transactions.get(reference).map(|stored| stored.transaction.clone()))
    }

    async fn update_refund_sub_state(
        &self,
        reference: &TransactionRef,
        sub_state: &RefundSubState,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        let mut transactions = self.transactions.write().await;
        match transactions.get_mut(reference) {
            Some(stored) => {
                stored.sub_state = Some(sub_state.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
