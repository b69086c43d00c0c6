use async_trait::async_trait;
use serde::Serialize;
use shared::utils::http_client::{HttpClientError, ServiceClient};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification service unavailable: {0}")]
    Unavailable(String),

    #[error("Notification rejected: {0}")]
    Rejected(String),
}

impl NotifyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, NotifyError::Unavailable(_))
    }
}

impl From<HttpClientError> for NotifyError {
    fn from(err: HttpClientError) -> Self {
        if err.is_transient() {
            NotifyError::Unavailable(err.to_string())
        } else {
            NotifyError::Rejected(err.to_string())
        }
    }
}

// Payload notifikasi, format sama dengan notification-service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    #[serde(rename = "notification_type")]
    pub category: String,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
    #[serde(rename = "related_id")]
    pub related_entity_id: Option<String>,
    #[serde(rename = "related_type")]
    pub related_entity_type: Option<String>,
}

impl Notification {
    pub const CATEGORY_REFUND: &'static str = "refund";

    pub fn refund(title: impl Into<String>, message: impl Into<String>, refund_id: &str) -> Self {
        Self {
            category: Self::CATEGORY_REFUND.to_string(),
            title: title.into(),
            message: message.into(),
            metadata: serde_json::Value::Null,
            related_entity_id: Some(refund_id.to_string()),
            related_entity_type: Some("refund".to_string()),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Delivery port for user-facing and operator-facing notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_user(&self, user_id: Uuid, notification: &Notification) -> Result<(), NotifyError>;

    async fn notify_operators(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize)]
struct UserNotificationBody<'a> {
    user_id: Uuid,
    #[serde(flatten)]
    notification: &'a Notification,
}

// Client ke notification-service internal API
#[derive(Clone)]
pub struct NotificationServiceClient {
    client: ServiceClient,
    token: Option<String>,
}

impl NotificationServiceClient {
    pub fn new(client: ServiceClient, token: Option<String>) -> Self {
        Self { client, token }
    }
}

#[async_trait]
impl Notifier for NotificationServiceClient {
    async fn notify_user(&self, user_id: Uuid, notification: &Notification) -> Result<(), NotifyError> {
        let body = UserNotificationBody { user_id, notification };

        self.client
            .post_ack("/api/internal/notifications", &body, self.token.as_deref())
            .await?;

        tracing::debug!(%user_id, title = %notification.title, "User notification delivered");
        Ok(())
    }

    async fn notify_operators(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.client
            .post_ack("/api/internal/notifications/admins", notification, self.token.as_deref())
            .await?;

        tracing::debug!(title = %notification.title, "Operator notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notification_wire_shape() {
        let notification = Notification::refund("Refund initiated", "We started your refund", "REF-1")
            .with_metadata(json!({ "amount": 500000 }));

        let body = UserNotificationBody {
            user_id: Uuid::nil(),
            notification: &notification,
        };
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["notification_type"], "refund");
        assert_eq!(value["related_id"], "REF-1");
        assert_eq!(value["related_type"], "refund");
        assert_eq!(value["metadata"]["amount"], 500000);
        assert_eq!(value["user_id"], Uuid::nil().to_string());
    }

    #[test]
    fn test_error_conversion_keeps_transience() {
        let err: NotifyError = HttpClientError::ServiceUnavailable("down".into()).into();
        assert!(err.is_transient());

        let err: NotifyError = HttpClientError::Unauthorized("bad token".into()).into();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transient() {
        let client = ServiceClient::new("http://127.0.0.1:1", std::time::Duration::from_millis(500)).unwrap();
        let notifier = NotificationServiceClient::new(client, None);

        let err = notifier
            .notify_operators(&Notification::refund("t", "m", "REF-1"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
