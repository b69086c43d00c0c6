use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::config::AppState;
use crate::domain::gateway::WebhookEnvelope;
use crate::error::{ErrorResponse, RefundError};

pub const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

/// Acknowledgement returned to the gateway for every accepted delivery.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    pub event: String,
    /// `processed`, `unchanged`, `unknown-refund` atau `ignored`
    pub action: String,
}

impl WebhookAck {
    fn new(event: &str, action: &str) -> Self {
        Self {
            received: true,
            event: event.to_string(),
            action: action.to_string(),
        }
    }
}

fn unauthorized(message: &str) -> Response {
    let body = ErrorResponse {
        error: "invalid_signature".to_string(),
        message: message.to_string(),
        details: None,
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// Handle refund webhooks dari payment gateway
#[utoipa::path(
    post,
    path = "/api/webhooks/gateway",
    tag = "Refund Service",
    summary = "Handle gateway webhook",
    description = "Verify the gateway signature and apply refund.processed events. Every other event is acknowledged and ignored.",
    params(
        ("X-Razorpay-Signature" = String, Header, description = "HMAC-SHA256 of the raw body, hex encoded")
    ),
    request_body(content = String, description = "Raw gateway event envelope", content_type = "application/json"),
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Malformed envelope", body = ErrorResponse),
        (status = 401, description = "Missing or invalid signature", body = ErrorResponse),
        (status = 502, description = "Gateway rejected the status lookup", body = ErrorResponse),
        (status = 503, description = "Gateway or database unavailable, or the refund is not recorded yet. Gateway should retry", body = ErrorResponse)
    )
)]
pub async fn gateway_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    // Extract dan validasi signature atas raw body
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        tracing::warn!("🚫 Webhook rejected: missing signature header");
        return unauthorized("Missing webhook signature");
    };

    if !state.gateway.verify_webhook_signature(&body, signature) {
        tracing::warn!("🚫 Webhook rejected: signature mismatch");
        return unauthorized("Invalid webhook signature");
    }

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            return RefundError::validation(format!("Malformed webhook payload: {}", e)).into_response();
        }
    };

    if envelope.event != WebhookEnvelope::REFUND_PROCESSED {
        tracing::debug!(event = %envelope.event, "Webhook event ignored");
        return Json(WebhookAck::new(&envelope.event, "ignored")).into_response();
    }

    let Some(gateway_refund_id) = envelope.refund_id() else {
        return RefundError::validation("refund.processed event without refund id").into_response();
    };

    tracing::info!(%gateway_refund_id, "📨 Refund webhook received");

    match state.refund_service.process_refund_outcome(gateway_refund_id).await {
        Ok(outcome) => {
            let action = if outcome.changed { "processed" } else { "unchanged" };
            Json(WebhookAck::new(&envelope.event, action)).into_response()
        }
        // Record belum tersimpan, 503 supaya gateway kirim ulang
        Err(err @ RefundError::RefundRecordPending(_)) => err.into_response(),
        // Refund lama yang tidak pernah dibuat lewat service ini
        Err(RefundError::RefundRecordNotFound(_)) => {
            tracing::warn!(
                %gateway_refund_id,
                reconciliation_candidate = true,
                "⚠️ Webhook for refund with no local record"
            );
            Json(WebhookAck::new(&envelope.event, "unknown-refund")).into_response()
        }
        Err(err) => err.into_response(),
    }
}
