use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::utils::validation::{is_valid_amount, is_valid_gateway_id, normalize_text, sanitize_html};
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use validator::Validate;

use crate::config::RefundPolicy;
use crate::domain::gateway::{GatewayRefund, GatewayRefundStatus, PaymentStatus, RefundNotes};
use crate::domain::refund::{
    Page, PageRequest, RefundFilter, RefundRecord, RefundSort, RefundStatus, DEFAULT_REFUND_METHOD,
};
use crate::domain::transaction::{OwningTransaction, TransactionRef, TransactionType};
use crate::error::{RefundError, RefundResult};
use crate::gateway::{GatewayError, PaymentGateway};
use crate::repositories::{RefundStore, StoreError};
use crate::services::dispatcher::{DispatchReport, RefundEvent, SideEffectDispatcher};
use crate::services::locator::TransactionLocator;
use crate::services::notifier::{Notification, Notifier};

/// Request to refund a captured gateway payment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InitiateRefundCommand {
    #[validate(length(min = 1, message = "payment_id wajib diisi"))]
    pub payment_id: String,

    /// Minor units. Defaults to the full refundable balance.
    #[validate(range(min = 1, message = "amount harus lebih dari 0"))]
    pub amount: Option<i64>,

    #[validate(length(min = 1, max = 500, message = "reason wajib diisi (maks 500 karakter)"))]
    pub reason: String,

    pub actor_id: Uuid,

    // Opsional: owning transaction yang sudah diketahui caller
    pub transaction_type: Option<String>,
    pub transaction_id: Option<Uuid>,
    pub installment_year: Option<i32>,
}

impl InitiateRefundCommand {
    fn explicit_reference(&self) -> RefundResult<Option<TransactionRef>> {
        match (&self.transaction_type, self.transaction_id) {
            (None, None) => Ok(None),
            (Some(kind), Some(id)) => TransactionRef::parse(kind, id, self.installment_year)
                .map(Some)
                .map_err(RefundError::Validation),
            _ => Err(RefundError::validation(
                "transaction_type and transaction_id must be supplied together",
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiatedRefund {
    pub record: RefundRecord,
    pub gateway_refund: GatewayRefund,
    #[serde(skip)]
    pub side_effects: DispatchReport,
}

/// Result of applying a gateway outcome or a cancellation to a record.
#[derive(Debug, Clone, Serialize)]
pub struct RefundOutcome {
    pub record: RefundRecord,
    pub previous_status: RefundStatus,
    pub changed: bool,
    #[serde(skip)]
    pub side_effects: DispatchReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub payment_id: String,
    /// Local refund ids whose status moved
    pub updated: Vec<String>,
    pub unchanged: usize,
    /// Gateway refund ids with no local record
    pub untracked_gateway_refunds: Vec<String>,
    /// Local refund ids the gateway does not list for this payment
    pub missing_at_gateway: Vec<String>,
}

// Payment yang sedang diproses di instance ini
#[derive(Clone, Default)]
struct InFlight(Arc<Mutex<HashSet<String>>>);

struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    payment_id: String,
}

impl InFlight {
    fn try_acquire(&self, payment_id: &str) -> Option<InFlightGuard> {
        let mut set = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !set.insert(payment_id.to_string()) {
            return None;
        }

        Some(InFlightGuard {
            set: Arc::clone(&self.0),
            payment_id: payment_id.to_string(),
        })
    }

    fn contains(&self, payment_id: &str) -> bool {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(payment_id)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        set.remove(&self.payment_id);
    }
}

/// Refund state machine.
///
/// Validates eligibility against the gateway, creates the gateway refund,
/// records it locally and emits post-commit side effects. Every outbound
/// call carries the timeout from [`RefundPolicy`].
#[derive(Clone)]
pub struct RefundService {
    gateway: Arc<dyn PaymentGateway>,
    refunds: Arc<dyn RefundStore>,
    locator: TransactionLocator,
    dispatcher: SideEffectDispatcher,
    policy: RefundPolicy,
    in_flight: InFlight,
}

impl RefundService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        refunds: Arc<dyn RefundStore>,
        locator: TransactionLocator,
        notifier: Arc<dyn Notifier>,
        policy: RefundPolicy,
    ) -> Self {
        let dispatcher = SideEffectDispatcher::new(
            locator.clone(),
            notifier,
            policy.side_effect_max_attempts,
            policy.side_effect_retry_backoff,
            policy.store_timeout,
        );

        Self {
            gateway,
            refunds,
            locator,
            dispatcher,
            policy,
            in_flight: InFlight::default(),
        }
    }

    async fn gateway_call<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        let limit = self.policy.gateway_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(GatewayError::Timeout(limit)))
    }

    async fn store_call<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let limit = self.policy.store_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(StoreError::Unavailable(format!("timed out after {:?}", limit))))
    }

    /// Initiate a refund against a captured gateway payment.
    ///
    /// Every check, including owner resolution, happens before the gateway
    /// refund is created, so a rejected request leaves no state behind. Once
    /// the gateway has accepted the refund, local bookkeeping runs on its own
    /// task and finishes even if the caller goes away.
    pub async fn initiate_refund(&self, command: InitiateRefundCommand) -> RefundResult<InitiatedRefund> {
        command
            .validate()
            .map_err(|e| RefundError::validation(e.to_string()))?;

        let payment_id = command.payment_id.trim().to_string();
        if !is_valid_gateway_id(&payment_id, "pay") {
            return Err(RefundError::validation(format!("Invalid payment id: {}", payment_id)));
        }

        let reason = normalize_text(&command.reason);
        if reason.is_empty() {
            return Err(RefundError::validation("Refund reason is required"));
        }

        let explicit_reference = command.explicit_reference()?;

        if let Some(amount) = command.amount {
            if amount < self.policy.min_refund_amount {
                return Err(RefundError::BelowMinimum {
                    amount,
                    minimum: self.policy.min_refund_amount,
                });
            }
            if !is_valid_amount(amount) {
                return Err(RefundError::validation(format!("Refund amount out of range: {}", amount)));
            }
        }

        // Tolak duplikasi sebelum menyentuh gateway
        let guard = self
            .in_flight
            .try_acquire(&payment_id)
            .ok_or_else(|| RefundError::RefundInProgress(payment_id.clone()))?;

        if self.store_call(self.refunds.has_open_refund(&payment_id)).await? {
            return Err(RefundError::RefundInProgress(payment_id));
        }

        // Ambil payment dari gateway
        let payment = self
            .gateway_call(self.gateway.fetch_payment(&payment_id))
            .await
            .map_err(|e| match e {
                GatewayError::NotFound(_) => RefundError::PaymentNotFound(payment_id.clone()),
                other => other.into(),
            })?;

        if payment.status != PaymentStatus::Captured {
            return Err(RefundError::NotCaptured(payment.status));
        }

        let available = payment.refundable_amount();
        if available <= 0 {
            return Err(RefundError::AlreadyFullyRefunded);
        }

        let final_amount = command.amount.unwrap_or(available);
        if final_amount > available {
            return Err(RefundError::ExceedsAvailable {
                requested: final_amount,
                available,
            });
        }
        if final_amount < self.policy.min_refund_amount {
            return Err(RefundError::BelowMinimum {
                amount: final_amount,
                minimum: self.policy.min_refund_amount,
            });
        }

        let now = Utc::now();
        let age = payment.age_at(now);
        if age > self.policy.stale_after {
            tracing::warn!(
                %payment_id,
                age_days = age.num_days(),
                "⚠️ Payment is older than the staleness threshold, gateway may reject the refund"
            );
        }

        let owner = self.resolve_owner(&payment_id, explicit_reference).await?;

        let notes = RefundNotes {
            reason: reason.clone(),
            refunded_by: command.actor_id.to_string(),
        };

        let gateway_refund = self
            .gateway_call(self.gateway.create_refund(&payment_id, final_amount, &notes))
            .await
            .map_err(|e| {
                match &e {
                    GatewayError::Rejected { kind, code, description } => tracing::error!(
                        %payment_id,
                        gateway_error_kind = %kind,
                        gateway_code = %code,
                        "❌ Gateway rejected refund: {}",
                        description
                    ),
                    other => tracing::error!(%payment_id, "❌ Gateway refund call failed: {}", other),
                }
                match e {
                    GatewayError::NotFound(_) => RefundError::PaymentNotFound(payment_id.clone()),
                    other => RefundError::from(other),
                }
            })?;

        let record = RefundRecord {
            id: Uuid::new_v4(),
            refund_id: RefundRecord::generate_refund_id(now),
            gateway_refund_id: gateway_refund.id.clone(),
            original_payment_id: payment.id.clone(),
            original_order_id: payment.order_id.clone(),
            refund_amount: final_amount,
            refund_status: RefundStatus::Initiated,
            user_id: owner.as_ref().and_then(|o| o.user_id),
            transaction_type: owner
                .as_ref()
                .map(|o| TransactionType::from(o.reference.kind()))
                .unwrap_or(TransactionType::Unknown),
            transaction_id: owner.as_ref().map(|o| o.reference.id()),
            installment_year: owner.as_ref().and_then(|o| o.reference.installment_year()),
            refund_reason: reason,
            refunded_by: command.actor_id,
            refund_method: DEFAULT_REFUND_METHOD.to_string(),
            note: None,
            initiated_at: now,
            processed_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        // Mulai dari sini tidak boleh dibatalkan
        let service = self.clone();
        let bookkeeping = tokio::spawn(async move {
            let _guard = guard;
            let record = service.persist_initiated(record).await?;
            let side_effects = service
                .dispatcher
                .dispatch(&record.refund_id, post_commit_events(&record, true))
                .await;
            Ok::<_, RefundError>((record, side_effects))
        });

        let (record, side_effects) = bookkeeping
            .await
            .map_err(|e| RefundError::Internal(format!("Refund bookkeeping task failed: {}", e)))??;

        tracing::info!(
            refund_id = %record.refund_id,
            gateway_refund_id = %record.gateway_refund_id,
            payment_id = %record.original_payment_id,
            amount = record.refund_amount,
            transaction_type = %record.transaction_type,
            "✅ Refund initiated"
        );

        Ok(InitiatedRefund {
            record,
            gateway_refund,
            side_effects,
        })
    }

    /// Resolve the owning transaction and its user. `None` is the orphan path.
    async fn resolve_owner(
        &self,
        payment_id: &str,
        explicit: Option<TransactionRef>,
    ) -> RefundResult<Option<OwningTransaction>> {
        let owner = match explicit {
            Some(reference) => {
                let found = self
                    .store_call(self.locator.resolve(&reference))
                    .await?
                    .ok_or_else(|| RefundError::TransactionNotFound(reference.to_string()))?;

                if let Some(owned_payment) = found.gateway_payment_id.as_deref() {
                    if owned_payment != payment_id {
                        return Err(RefundError::validation(format!(
                            "Transaction {} does not own payment {}",
                            reference, payment_id
                        )));
                    }
                }
                Some(found)
            }
            None => self.store_call(self.locator.locate(payment_id)).await?,
        };

        match owner {
            Some(found) if found.user_id.is_none() => Err(RefundError::UserNotFound(found.reference.to_string())),
            Some(found) => Ok(Some(found)),
            None => {
                tracing::warn!(%payment_id, "⚠️ No local transaction found, recording orphan refund");
                Ok(None)
            }
        }
    }

    /// Persist a record for a refund the gateway already created.
    async fn persist_initiated(&self, record: RefundRecord) -> RefundResult<RefundRecord> {
        let attempts = self.policy.persist_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.store_call(self.refunds.create(&record)).await {
                Ok(created) => return Ok(created),
                // Attempt sebelumnya ternyata sudah commit
                Err(StoreError::Duplicate(_)) if attempt > 1 => {
                    if let Ok(Some(existing)) = self
                        .store_call(self.refunds.find_by_gateway_refund_id(&record.gateway_refund_id))
                        .await
                    {
                        return Ok(existing);
                    }
                    last_error = "duplicate record could not be read back".to_string();
                }
                Err(err) => {
                    tracing::warn!(
                        refund_id = %record.refund_id,
                        gateway_refund_id = %record.gateway_refund_id,
                        attempt,
                        "⚠️ Failed to persist refund record: {}",
                        err
                    );
                    last_error = err.to_string();
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.policy.side_effect_retry_backoff * attempt).await;
            }
        }

        tracing::error!(
            reconciliation_candidate = true,
            refund_id = %record.refund_id,
            gateway_refund_id = %record.gateway_refund_id,
            payment_id = %record.original_payment_id,
            amount = record.refund_amount,
            transaction_type = %record.transaction_type,
            transaction_id = ?record.transaction_id,
            "🚨 Gateway refund created but local record could not be persisted: {}",
            last_error
        );

        Err(RefundError::UnrecordedGatewayRefund {
            gateway_refund_id: record.gateway_refund_id,
            reason: last_error,
        })
    }

    /// Apply the gateway's current status for a refund (inbound confirmation).
    ///
    /// A refund the gateway knows but this service has not recorded yet
    /// (bookkeeping still running, or created moments ago on another
    /// instance) fails with the retryable [`RefundError::RefundRecordPending`]
    /// so the confirmation is redelivered once the record exists. Only older
    /// unrecorded refunds are reported as `RefundRecordNotFound`.
    pub async fn process_refund_outcome(&self, gateway_refund_id: &str) -> RefundResult<RefundOutcome> {
        let record = self
            .store_call(self.refunds.find_by_gateway_refund_id(gateway_refund_id))
            .await?;

        let gateway_refund = self
            .gateway_call(self.gateway.fetch_refund(gateway_refund_id))
            .await
            .map_err(|e| match e {
                GatewayError::NotFound(_) => RefundError::RefundRecordNotFound(gateway_refund_id.to_string()),
                other => other.into(),
            })?;

        match record {
            Some(record) => self.apply_gateway_outcome(record, &gateway_refund).await,
            None => Err(self.unrecorded_outcome(&gateway_refund)),
        }
    }

    // Refund ada di gateway tapi belum ada record lokal
    fn unrecorded_outcome(&self, gateway_refund: &GatewayRefund) -> RefundError {
        let age = Utc::now() - gateway_refund.created_at;
        let in_flight = self.in_flight.contains(&gateway_refund.payment_id);

        if in_flight || age <= self.policy.pending_record_grace {
            tracing::info!(
                gateway_refund_id = %gateway_refund.id,
                payment_id = %gateway_refund.payment_id,
                in_flight,
                age_secs = age.num_seconds(),
                "⏳ Refund outcome arrived before the local record, asking for redelivery"
            );
            return RefundError::RefundRecordPending(gateway_refund.id.clone());
        }

        RefundError::RefundRecordNotFound(gateway_refund.id.clone())
    }

    async fn apply_gateway_outcome(
        &self,
        mut record: RefundRecord,
        gateway_refund: &GatewayRefund,
    ) -> RefundResult<RefundOutcome> {
        let previous_status = record.refund_status;
        let now = Utc::now();
        let mut changed = false;

        for target in outcome_path(gateway_refund) {
            if record.refund_status == *target {
                continue;
            }
            if record.apply_transition(*target, now).is_err() {
                if record.refund_status.is_terminal() && !changed {
                    tracing::warn!(
                        refund_id = %record.refund_id,
                        local_status = %record.refund_status,
                        gateway_status = gateway_refund.status.as_str(),
                        "⚠️ Gateway status disagrees with terminal local refund, keeping local state"
                    );
                }
                break;
            }
            changed = true;
        }

        if !changed {
            // Tetap re-sync sub-state, tanpa notifikasi
            let side_effects = self
                .dispatcher
                .dispatch(&record.refund_id, post_commit_events(&record, false))
                .await;
            return Ok(RefundOutcome {
                record,
                previous_status,
                changed: false,
                side_effects,
            });
        }

        if !self.store_call(self.refunds.update_status(&record, previous_status)).await? {
            return self.lost_race(&record.refund_id, previous_status).await;
        }

        tracing::info!(
            refund_id = %record.refund_id,
            gateway_refund_id = %record.gateway_refund_id,
            from = %previous_status,
            to = %record.refund_status,
            "🔄 Refund status updated from gateway"
        );

        let side_effects = self
            .dispatcher
            .dispatch(&record.refund_id, post_commit_events(&record, true))
            .await;

        Ok(RefundOutcome {
            record,
            previous_status,
            changed: true,
            side_effects,
        })
    }

    // Writer lain sudah mengubah record lebih dulu
    async fn lost_race(&self, refund_id: &str, expected: RefundStatus) -> RefundResult<RefundOutcome> {
        let current = self
            .store_call(self.refunds.find_by_refund_id(refund_id))
            .await?
            .ok_or_else(|| RefundError::RefundRecordNotFound(refund_id.to_string()))?;

        tracing::warn!(
            %refund_id,
            expected = %expected,
            actual = %current.refund_status,
            "⚠️ Concurrent refund update detected, keeping the stored state"
        );

        Ok(RefundOutcome {
            previous_status: current.refund_status,
            record: current,
            changed: false,
            side_effects: DispatchReport::default(),
        })
    }

    /// Cancel a refund that is still `initiated`.
    ///
    /// Local only: the gateway exposes no cancel call for refunds.
    pub async fn cancel_refund(&self, refund_id: &str, reason: &str) -> RefundResult<RefundOutcome> {
        let reason = normalize_text(reason);
        if reason.is_empty() {
            return Err(RefundError::validation("Cancellation reason is required"));
        }

        let mut record = self
            .store_call(self.refunds.find_by_refund_id(refund_id))
            .await?
            .ok_or_else(|| RefundError::RefundRecordNotFound(refund_id.to_string()))?;

        let previous_status = record.refund_status;
        record
            .apply_transition(RefundStatus::Cancelled, Utc::now())
            .map_err(|(from, to)| RefundError::InvalidTransition { from, to })?;
        record.note = Some(reason);

        if !self.store_call(self.refunds.update_status(&record, previous_status)).await? {
            let current = self
                .store_call(self.refunds.find_by_refund_id(refund_id))
                .await?
                .ok_or_else(|| RefundError::RefundRecordNotFound(refund_id.to_string()))?;
            return Err(RefundError::InvalidTransition {
                from: current.refund_status,
                to: RefundStatus::Cancelled,
            });
        }

        tracing::info!(%refund_id, "🛑 Refund cancelled");

        let side_effects = self
            .dispatcher
            .dispatch(&record.refund_id, post_commit_events(&record, true))
            .await;

        Ok(RefundOutcome {
            record,
            previous_status,
            changed: true,
            side_effects,
        })
    }

    pub async fn get_refund(&self, refund_id: &str) -> RefundResult<RefundRecord> {
        self.store_call(self.refunds.find_by_refund_id(refund_id))
            .await?
            .ok_or_else(|| RefundError::RefundRecordNotFound(refund_id.to_string()))
    }

    pub async fn list_refunds(
        &self,
        filter: RefundFilter,
        sort: RefundSort,
        page: u32,
        page_size: u32,
    ) -> RefundResult<Page<RefundRecord>> {
        let request = PageRequest::new(page, page_size);
        let (items, total) = self
            .store_call(self.refunds.find_many(&filter, sort, request))
            .await?;

        Ok(Page::new(items, total, request))
    }

    pub async fn list_user_refunds(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> RefundResult<Page<RefundRecord>> {
        let filter = RefundFilter {
            user_id: Some(user_id),
            ..Default::default()
        };
        self.list_refunds(filter, RefundSort::CreatedAtDesc, page, page_size).await
    }

    /// Re-sync every local refund of a payment with the gateway's list.
    pub async fn reconcile_payment(&self, payment_id: &str) -> RefundResult<ReconciliationReport> {
        let gateway_refunds = self
            .gateway_call(self.gateway.list_refunds(payment_id))
            .await
            .map_err(|e| match e {
                GatewayError::NotFound(_) => RefundError::PaymentNotFound(payment_id.to_string()),
                other => other.into(),
            })?;

        let local = self.store_call(self.refunds.find_by_payment_id(payment_id)).await?;
        let tracked: HashSet<String> = local.iter().map(|r| r.gateway_refund_id.clone()).collect();

        let mut report = ReconciliationReport {
            payment_id: payment_id.to_string(),
            ..Default::default()
        };

        for record in local {
            let Some(gateway_refund) = gateway_refunds.iter().find(|g| g.id == record.gateway_refund_id) else {
                tracing::warn!(
                    refund_id = %record.refund_id,
                    gateway_refund_id = %record.gateway_refund_id,
                    "⚠️ Local refund not listed by gateway"
                );
                report.missing_at_gateway.push(record.refund_id);
                continue;
            };

            let refund_id = record.refund_id.clone();
            let outcome = self.apply_gateway_outcome(record, gateway_refund).await?;
            if outcome.changed {
                report.updated.push(refund_id);
            } else {
                report.unchanged += 1;
            }
        }

        for gateway_refund in gateway_refunds.iter().filter(|g| !tracked.contains(&g.id)) {
            tracing::warn!(
                %payment_id,
                gateway_refund_id = %gateway_refund.id,
                amount = gateway_refund.amount,
                reconciliation_candidate = true,
                "⚠️ Gateway refund has no local record"
            );
            report.untracked_gateway_refunds.push(gateway_refund.id.clone());
        }

        tracing::info!(
            %payment_id,
            updated = report.updated.len(),
            unchanged = report.unchanged,
            untracked = report.untracked_gateway_refunds.len(),
            missing = report.missing_at_gateway.len(),
            "🔍 Payment refunds reconciled"
        );

        Ok(report)
    }
}

/// Local statuses a gateway refund maps to, in the order they must be applied.
///
/// `pending` maps to nothing rather than `failed`, since the gateway is still
/// working on it and a later confirmation carries the real outcome. `processed`
/// with an acquirer reference means the bank has settled, so the record walks
/// through `processed` to `successful`.
fn outcome_path(gateway_refund: &GatewayRefund) -> &'static [RefundStatus] {
    match gateway_refund.status {
        GatewayRefundStatus::Pending => &[],
        GatewayRefundStatus::Processed if gateway_refund.settlement_reference().is_some() => {
            &[RefundStatus::Processed, RefundStatus::Successful]
        }
        GatewayRefundStatus::Processed => &[RefundStatus::Processed],
        GatewayRefundStatus::Failed | GatewayRefundStatus::Unknown => &[RefundStatus::Failed],
    }
}

// Format minor unit ke major unit, contoh 500000 -> 5000.00
fn format_amount(amount_minor: i64) -> String {
    format!("{}.{:02}", amount_minor / 100, (amount_minor % 100).abs())
}

fn describe(record: &RefundRecord) -> (&'static str, String) {
    let amount = format_amount(record.refund_amount);
    match record.refund_status {
        RefundStatus::Initiated => (
            "Refund initiated",
            format!("A refund of {} has been initiated for your payment.", amount),
        ),
        RefundStatus::Processed => (
            "Refund processed",
            format!("Your refund of {} has been processed and is on its way to your original payment method.", amount),
        ),
        RefundStatus::Successful => (
            "Refund completed",
            format!("Your refund of {} has been credited to your original payment method.", amount),
        ),
        RefundStatus::Failed => (
            "Refund failed",
            format!("Your refund of {} could not be completed. Our team will contact you.", amount),
        ),
        RefundStatus::Cancelled => (
            "Refund cancelled",
            format!("The refund of {} has been cancelled.", amount),
        ),
    }
}

/// Side effects to run after a record change has been committed.
///
/// The sub-state sync is always emitted for located records so an unchanged
/// outcome still repairs a drifted mirror. Notifications only when `notify`.
fn post_commit_events(record: &RefundRecord, notify: bool) -> Vec<RefundEvent> {
    let mut events = Vec::new();

    if let Some(reference) = record.transaction_ref() {
        events.push(RefundEvent::SyncSubState {
            reference,
            sub_state: record.sub_state(),
        });
    }

    if !notify {
        return events;
    }

    let (title, user_message) = describe(record);
    let metadata = json!({
        "refund_id": record.refund_id,
        "gateway_refund_id": record.gateway_refund_id,
        "payment_id": record.original_payment_id,
        "amount": record.refund_amount,
        "status": record.refund_status,
        "transaction_type": record.transaction_type,
        "transaction_id": record.transaction_id,
    });

    if let Some(user_id) = record.user_id {
        events.push(RefundEvent::NotifyUser {
            user_id,
            notification: Notification::refund(title, user_message, &record.refund_id)
                .with_metadata(metadata.clone()),
        });
    }

    let mut operator_message = format!(
        "Refund {} for payment {} ({}) is now {}. Reason: {}",
        record.refund_id,
        record.original_payment_id,
        format_amount(record.refund_amount),
        record.refund_status,
        sanitize_html(&record.refund_reason),
    );
    if record.is_orphan() {
        operator_message.push_str(" [orphan: no local transaction]");
    }
    if let Some(note) = &record.note {
        operator_message.push_str(&format!(" Note: {}", sanitize_html(note)));
    }

    events.push(RefundEvent::NotifyOperators {
        notification: Notification::refund(title, operator_message, &record.refund_id).with_metadata(metadata),
    });

    events
}
