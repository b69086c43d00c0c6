// API Routes untuk Refund Service

use crate::config::AppState;
use crate::handlers::{health, webhook};
use axum::{
    extract::Request,
    http::{header::HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// OpenAPI Documentation untuk Refund Service
#[derive(OpenApi)]
#[openapi(
    paths(
        webhook::gateway_webhook,
        health::health_check,
    ),
    components(
        schemas(
            webhook::WebhookAck,
            crate::config::HealthStatus,
            crate::error::ErrorResponse,
            crate::domain::refund::RefundRecord,
            crate::domain::refund::RefundStatus,
            crate::domain::transaction::TransactionType,
        )
    ),
    tags(
        (name = "Refund Service", description = "Payment refund lifecycle and gateway reconciliation")
    ),
    info(
        title = "Refund Service API",
        description = "Refund service with Razorpay integration\n\n## Features\n\n- 💸 Full and partial refunds of captured payments\n- 🔐 Signed gateway webhooks\n- 🔄 Refund status tracking on the owning transaction",
        version = "1.0.0"
    )
)]
pub struct ApiDoc;

// Security headers middleware
async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
    headers.insert(
        "Strict-Transport-Security",
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );

    response
}

// Buat router utama
pub fn create_routes(state: AppState) -> Router {
    if state.config.is_production() {
        tracing::warn!("Refund Service running in PRODUCTION mode");
    } else {
        tracing::info!("Refund Service running in DEVELOPMENT mode");
    }

    // Request timeout harus lebih lama dari panggilan gateway + database
    let policy = &state.config.policy;
    let request_timeout = policy.gateway_timeout * 2 + policy.store_timeout * 2 + Duration::from_secs(5);

    Router::new()
        .route("/health", get(health::health_check))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", build_api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout)),
        )
        .layer(axum::middleware::from_fn(security_headers_middleware))
}

fn build_api_routes() -> Router<AppState> {
    Router::new()
        // ===== Webhook (External - Gateway) =====
        .route("/webhooks/gateway", post(webhook::gateway_webhook))
}
