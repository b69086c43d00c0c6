use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::refund::RefundSubState;
use crate::domain::transaction::TransactionRef;
use crate::repositories::StoreError;
use crate::services::locator::TransactionLocator;
use crate::services::notifier::{Notification, Notifier, NotifyError};

/// Post-commit side effect emitted by the refund state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RefundEvent {
    SyncSubState {
        reference: TransactionRef,
        sub_state: RefundSubState,
    },
    NotifyUser {
        user_id: Uuid,
        notification: Notification,
    },
    NotifyOperators {
        notification: Notification,
    },
}

impl RefundEvent {
    pub fn label(&self) -> &'static str {
        match self {
            RefundEvent::SyncSubState { .. } => "sync-sub-state",
            RefundEvent::NotifyUser { .. } => "notify-user",
            RefundEvent::NotifyOperators { .. } => "notify-operators",
        }
    }
}

#[derive(Debug, Error)]
enum SideEffectError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("owning transaction {0} no longer exists")]
    TargetMissing(TransactionRef),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl SideEffectError {
    fn is_retryable(&self) -> bool {
        match self {
            SideEffectError::Store(StoreError::Unavailable(_)) => true,
            SideEffectError::Notify(err) => err.is_transient(),
            SideEffectError::Timeout(_) => true,
            _ => false,
        }
    }
}

/// Outcome of one dispatch run. Never surfaced to the refund caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: Vec<&'static str>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

// Konsumsi event list setelah commit, retry dengan backoff lalu log
#[derive(Clone)]
pub struct SideEffectDispatcher {
    locator: TransactionLocator,
    notifier: Arc<dyn Notifier>,
    max_attempts: u32,
    backoff: Duration,
    attempt_timeout: Duration,
}

impl SideEffectDispatcher {
    pub fn new(
        locator: TransactionLocator,
        notifier: Arc<dyn Notifier>,
        max_attempts: u32,
        backoff: Duration,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            locator,
            notifier,
            max_attempts: max_attempts.max(1),
            backoff,
            attempt_timeout,
        }
    }

    pub async fn dispatch(&self, refund_id: &str, events: Vec<RefundEvent>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for event in events {
            if self.deliver_with_retry(refund_id, &event).await {
                report.delivered += 1;
            } else {
                report.failed.push(event.label());
            }
        }

        report
    }

    async fn deliver_with_retry(&self, refund_id: &str, event: &RefundEvent) -> bool {
        let mut attempt = 1;

        loop {
            let outcome = match tokio::time::timeout(self.attempt_timeout, self.deliver(event)).await {
                Ok(result) => result,
                Err(_) => Err(SideEffectError::Timeout(self.attempt_timeout)),
            };

            match outcome {
                Ok(()) => return true,
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    tracing::warn!(
                        %refund_id,
                        side_effect = event.label(),
                        attempt,
                        "⚠️ Side effect failed, retrying: {}",
                        err
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(
                        %refund_id,
                        side_effect = event.label(),
                        attempt,
                        "❌ Side effect given up: {}",
                        err
                    );
                    return false;
                }
            }
        }
    }

    async fn deliver(&self, event: &RefundEvent) -> Result<(), SideEffectError> {
        match event {
            RefundEvent::SyncSubState { reference, sub_state } => {
                if self.locator.update_sub_state(reference, sub_state).await? {
                    Ok(())
                } else {
                    Err(SideEffectError::TargetMissing(*reference))
                }
            }
            RefundEvent::NotifyUser { user_id, notification } => {
                self.notifier.notify_user(*user_id, notification).await?;
                Ok(())
            }
            RefundEvent::NotifyOperators { notification } => {
                self.notifier.notify_operators(notification).await?;
                Ok(())
            }
        }
    }
}
