use anyhow::Context;
use refund_service::config::{init_db_pool, AppConfig, AppState};
use refund_service::gateway::razorpay::RazorpayClient;
use refund_service::repositories::{PgInstallmentPlanStore, PgRefundRepository, PgTokenStore};
use refund_service::routes::create_routes;
use refund_service::services::locator::TransactionLocator;
use refund_service::services::notifier::NotificationServiceClient;
use refund_service::services::refund_service::RefundService;
use shared::utils::http_client::ServiceClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Entry point dari Refund Service Big Auto
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Setup logging dengan environment
    setup_logging();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let app_state = build_state(config).await?;

    info!(
        "🚀 Refund Service starting on {}:{}",
        app_state.config.server_host, app_state.config.server_port
    );
    info!(
        "💳 Gateway: {} | Mode: {}",
        app_state.config.gateway.api_url,
        if app_state.gateway.is_test_mode() { "Test" } else { "Live" }
    );

    start_server(app_state).await
}

/// Inisialisasi structured logging berdasarkan environment
fn setup_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("refund_service=debug,tower_http=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

// Rakit semua dependency service secara eksplisit
async fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    let db = init_db_pool(&config.database_url, config.policy.store_timeout)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("Failed to run database migrations")?;
    info!("✅ Database migrations applied");

    let gateway = Arc::new(RazorpayClient::new(&config.gateway).context("Failed to build gateway client")?);

    let locator = TransactionLocator::new(
        Arc::new(PgTokenStore::prepayment(db.clone())),
        Arc::new(PgTokenStore::reservation(db.clone())),
        Arc::new(PgInstallmentPlanStore::new(db.clone())),
    );

    let notification_client = ServiceClient::new(config.notification_service_url.clone(), Duration::from_secs(10))
        .context("Failed to build notification service client")?;
    let notifier = NotificationServiceClient::new(notification_client, config.notification_service_token.clone());

    let refund_service = RefundService::new(
        gateway.clone(),
        Arc::new(PgRefundRepository::new(db.clone())),
        locator,
        Arc::new(notifier),
        config.policy.clone(),
    );

    Ok(AppState {
        db,
        config,
        gateway,
        refund_service,
    })
}

/// Start server dengan graceful shutdown
async fn start_server(app_state: AppState) -> anyhow::Result<()> {
    let address = format!("{}:{}", app_state.config.server_host, app_state.config.server_port);
    let app = create_routes(app_state);

    // Bind listener ke configured address
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("🌐 Server running on http://{}", address);
    info!("📚 API Docs: http://{}/docs", address);
    info!("🏥 Health Check: http://{}/health", address);

    // Setup graceful shutdown signal handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("❌ Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("🛑 Received shutdown signal");
    };

    // Run server dengan graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("✅ Refund Service shutdown successfully");
    Ok(())
}
