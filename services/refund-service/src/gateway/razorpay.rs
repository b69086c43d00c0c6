use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::domain::gateway::{GatewayPayment, GatewayRefund, RefundNotes};
use crate::gateway::{classify, signature, GatewayError, PaymentGateway};

// Service untuk integrasi Razorpay REST API
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: String,
    webhook_secret: String,
    api_url: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct CreateRefundBody<'a> {
    amount: i64,
    speed: &'a str,
    notes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

// Bentuk error body dari gateway
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Standard { error: ErrorDetail },
    Simple { message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    reason: Option<String>,
}

impl RazorpayClient {
    // Buat Razorpay client baru dari config
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    /// Check apakah key yang dipakai adalah test-mode key
    pub fn is_test_mode(&self) -> bool {
        self.key_id.starts_with("rzp_test_")
    }

    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        signature::verify_webhook_signature(&self.webhook_secret, body, signature)
    }

    pub fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        signature::verify_payment_signature(&self.key_secret, order_id, payment_id, signature)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, resource: &str) -> Result<T, GatewayError> {
        let response = self
            .client
            .get(self.url(path))
            .header("Accept", "application/json")
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        self.read_response(response, resource).await
    }

    async fn read_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        resource: &str,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if status.is_success() {
            return serde_json::from_str(&body)
                .map_err(|e| GatewayError::InvalidResponse(format!("Failed to parse {}: {}", resource, e)));
        }

        let err = error_from_response(status, &body, resource);
        tracing::error!("❌ Razorpay request failed for {}: {}", resource, err);
        Err(err)
    }

    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Unavailable(format!("Failed to call Razorpay API: {}", err))
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let payment: GatewayPayment = self
            .get_json(&format!("payments/{}", payment_id), &format!("payment {}", payment_id))
            .await?;

        tracing::debug!(payment_id = %payment.id, status = %payment.status, "Fetched payment from Razorpay");
        Ok(payment)
    }

    async fn create_refund(
        &self,
        payment_id: &str,
        amount: i64,
        notes: &RefundNotes,
    ) -> Result<GatewayRefund, GatewayError> {
        let body = CreateRefundBody {
            amount,
            speed: "normal",
            notes: notes.to_map(),
        };

        let response = self
            .client
            .post(self.url(&format!("payments/{}/refund", payment_id)))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let refund: GatewayRefund = self
            .read_response(response, &format!("refund for payment {}", payment_id))
            .await?;

        tracing::info!(
            "✅ Razorpay refund created: {} for payment {} ({} minor units)",
            refund.id,
            payment_id,
            amount
        );
        Ok(refund)
    }

    async fn fetch_refund(&self, gateway_refund_id: &str) -> Result<GatewayRefund, GatewayError> {
        self.get_json(
            &format!("refunds/{}", gateway_refund_id),
            &format!("refund {}", gateway_refund_id),
        )
        .await
    }

    async fn list_refunds(&self, payment_id: &str) -> Result<Vec<GatewayRefund>, GatewayError> {
        let resource = format!("refunds of payment {}", payment_id);
        collect_pages(|skip| {
            let path = format!("payments/{}/refunds?count={}&skip={}", payment_id, LIST_PAGE_SIZE, skip);
            let resource = resource.clone();
            async move {
                let page: Collection<GatewayRefund> = self.get_json(&path, &resource).await?;
                Ok(page.items)
            }
        })
        .await
    }
}

// Batas count per request dari Razorpay
const LIST_PAGE_SIZE: usize = 100;

/// Fetch collection pages with `skip` until a short page comes back.
async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>, GatewayError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, GatewayError>>,
{
    let mut items = Vec::new();
    loop {
        let page = fetch_page(items.len()).await?;
        let full_page = page.len() >= LIST_PAGE_SIZE;
        items.extend(page);
        if !full_page {
            return Ok(items);
        }
    }
}

/// Normalisasi HTTP error dari gateway ke `GatewayError`
fn error_from_response(status: StatusCode, body: &str, resource: &str) -> GatewayError {
    if status == StatusCode::NOT_FOUND {
        return GatewayError::NotFound(resource.to_string());
    }

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return GatewayError::Unavailable(format!("Razorpay returned {}", status));
    }

    let (code, description) = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::Standard { error }) => {
            let description = match error.reason.filter(|r| !r.is_empty() && r != "NA") {
                Some(reason) => format!("{} ({})", error.description, reason),
                None => error.description,
            };
            (error.code, description)
        }
        Ok(ErrorBody::Simple { message }) => ("UNKNOWN_ERROR".to_string(), message),
        Err(_) => ("UNKNOWN_ERROR".to_string(), body.chars().take(200).collect()),
    };

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return GatewayError::rejected("AUTHENTICATION_ERROR", description);
    }

    if classify::is_not_found(&description) {
        return GatewayError::NotFound(resource.to_string());
    }

    GatewayError::rejected(code, description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayErrorKind;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            key_id: "rzp_test_1DP5mmOlF5G5ag".to_string(),
            key_secret: "thisissupersecret".to_string(),
            webhook_secret: "webhook-secret".to_string(),
            api_url: "https://api.razorpay.com/v1/".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_client_from_config() {
        let client = RazorpayClient::new(&test_config()).unwrap();
        assert!(client.is_test_mode());
        assert_eq!(
            client.url("payments/pay_1/refund"),
            "https://api.razorpay.com/v1/payments/pay_1/refund"
        );
    }

    #[test]
    fn test_signature_helpers_use_right_secret() {
        let client = RazorpayClient::new(&test_config()).unwrap();

        let body = br#"{"event":"refund.processed"}"#;
        let webhook_sig = signature::sign("webhook-secret", body);
        assert!(client.verify_webhook_signature(body, &webhook_sig));

        let payment_sig = signature::sign("thisissupersecret", b"order_1|pay_1");
        assert!(client.verify_payment_signature("order_1", "pay_1", &payment_sig));
        assert!(!client.verify_webhook_signature(b"order_1|pay_1", &payment_sig));
    }

    #[test]
    fn test_standard_error_is_classified() {
        let body = r#"{"error":{"code":"BAD_REQUEST_ERROR","description":"Your account does not have enough balance to carry out the refund operation.","source":"business","step":"payment_initiation","reason":"NA"}}"#;
        let err = error_from_response(StatusCode::BAD_REQUEST, body, "refund");

        match err {
            GatewayError::Rejected { kind, code, .. } => {
                assert_eq!(kind, GatewayErrorKind::InsufficientBalance);
                assert_eq!(code, "BAD_REQUEST_ERROR");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_id_maps_to_not_found() {
        let body = r#"{"error":{"code":"BAD_REQUEST_ERROR","description":"The id provided does not exist"}}"#;
        let err = error_from_response(StatusCode::BAD_REQUEST, body, "payment pay_x");
        assert!(matches!(err, GatewayError::NotFound(r) if r == "payment pay_x"));

        let err = error_from_response(StatusCode::NOT_FOUND, "", "refund rfnd_x");
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[test]
    fn test_simple_error_body() {
        let body = r#"{"message":"no Route matched with those values"}"#;
        let err = error_from_response(StatusCode::BAD_REQUEST, body, "refund");
        assert!(matches!(err, GatewayError::Rejected { kind: GatewayErrorKind::Unknown, .. }));
    }

    #[test]
    fn test_server_errors_are_unavailable() {
        assert!(matches!(
            error_from_response(StatusCode::BAD_GATEWAY, "<html>", "payment"),
            GatewayError::Unavailable(_)
        ));
        assert!(matches!(
            error_from_response(StatusCode::TOO_MANY_REQUESTS, "", "payment"),
            GatewayError::Unavailable(_)
        ));
    }

    #[test]
    fn test_auth_failure_is_rejected_unknown() {
        let body = r#"{"error":{"code":"BAD_REQUEST_ERROR","description":"Authentication failed"}}"#;
        match error_from_response(StatusCode::UNAUTHORIZED, body, "payment") {
            GatewayError::Rejected { kind, code, .. } => {
                assert_eq!(kind, GatewayErrorKind::Unknown);
                assert_eq!(code, "AUTHENTICATION_ERROR");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_reason_is_appended_to_description() {
        let body = r#"{"error":{"code":"BAD_REQUEST_ERROR","description":"Refund failed","reason":"refund_not_supported_in_test_mode"}}"#;
        match error_from_response(StatusCode::BAD_REQUEST, body, "refund") {
            GatewayError::Rejected { kind, description, .. } => {
                assert_eq!(kind, GatewayErrorKind::TestModeRestricted);
                assert!(description.contains("refund_not_supported_in_test_mode"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_refund_collection_parsing() {
        let body = r#"{"entity":"collection","count":1,"items":[{"id":"rfnd_1","payment_id":"pay_1","amount":100,"status":"pending","notes":{"reason":"x"},"created_at":1700000000}]}"#;
        let parsed: Collection<GatewayRefund> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].id, "rfnd_1");
    }

    #[tokio::test]
    async fn test_refund_listing_follows_pages() {
        let total = 2 * LIST_PAGE_SIZE + 37;
        let mut requested = Vec::new();

        let items = collect_pages(|skip| {
            requested.push(skip);
            let end = (skip + LIST_PAGE_SIZE).min(total);
            async move { Ok::<_, GatewayError>((skip..end).collect::<Vec<_>>()) }
        })
        .await
        .unwrap();

        assert_eq!(items.len(), total);
        assert_eq!(items.last(), Some(&(total - 1)));
        assert_eq!(requested, vec![0, LIST_PAGE_SIZE, 2 * LIST_PAGE_SIZE]);
    }

    #[tokio::test]
    async fn test_refund_listing_stops_on_error() {
        let mut calls = 0;
        let result: Result<Vec<u32>, _> = collect_pages(|skip| {
            calls += 1;
            async move {
                if skip == 0 {
                    Ok(vec![0; LIST_PAGE_SIZE])
                } else {
                    Err(GatewayError::Unavailable("Razorpay returned 503".into()))
                }
            }
        })
        .await;

        assert!(matches!(result, Err(GatewayError::Unavailable(_))));
        assert_eq!(calls, 2);
    }
}
