// Refund Service Configuration
use sqlx::{postgres::PgConnectOptions, postgres::PgPoolOptions, PgPool};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::gateway::razorpay::RazorpayClient;
use crate::services::refund_service::RefundService;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} harus diset di environment")]
    Missing(&'static str),

    #[error("{key} tidak valid: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Credentials and transport settings for the payment gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    pub api_url: String,
    pub timeout: Duration,
}

/// Business thresholds and side-effect tuning for the refund state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundPolicy {
    /// Minimum refundable amount in minor units
    pub min_refund_amount: i64,
    /// Payments older than this get a staleness warning
    pub stale_after: chrono::Duration,
    /// How long after gateway creation a refund with no local record is
    /// treated as still being recorded rather than foreign
    pub pending_record_grace: chrono::Duration,
    pub gateway_timeout: Duration,
    pub store_timeout: Duration,
    pub side_effect_max_attempts: u32,
    pub side_effect_retry_backoff: Duration,
    /// Attempts to persist a record after the gateway refund already exists
    pub persist_attempts: u32,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            min_refund_amount: 100,
            stale_after: chrono::Duration::days(180),
            pending_record_grace: chrono::Duration::minutes(10),
            gateway_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(10),
            side_effect_max_attempts: 3,
            side_effect_retry_backoff: Duration::from_millis(200),
            persist_attempts: 3,
        }
    }
}

// Konfigurasi aplikasi dari environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub gateway: GatewayConfig,
    pub notification_service_url: String,
    pub notification_service_token: Option<String>,
    pub policy: RefundPolicy,
}

impl AppConfig {
    // Load konfigurasi dari environment dengan validasi
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup (process env in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let database_url = required("DATABASE_URL")?;
        let server_host = lookup("REFUND_SERVICE_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let server_port = parsed_or(&lookup, "REFUND_SERVICE_PORT", 3009u16)?;
        let environment = lookup("RUST_ENV").unwrap_or_else(|| "development".to_string());

        let gateway_timeout = Duration::from_secs(parsed_or(&lookup, "GATEWAY_TIMEOUT_SECS", 30u64)?);

        let gateway = GatewayConfig {
            key_id: required("RAZORPAY_KEY_ID")?,
            key_secret: required("RAZORPAY_KEY_SECRET")?,
            webhook_secret: required("RAZORPAY_WEBHOOK_SECRET")?,
            api_url: lookup("RAZORPAY_API_URL")
                .unwrap_or_else(|| "https://api.razorpay.com/v1".to_string()),
            timeout: gateway_timeout,
        };

        let min_refund_amount = parsed_or(&lookup, "REFUND_MIN_AMOUNT", 100i64)?;
        if min_refund_amount <= 0 {
            return Err(ConfigError::Invalid {
                key: "REFUND_MIN_AMOUNT",
                value: min_refund_amount.to_string(),
            });
        }

        // Nilai di luar range chrono harus jadi ConfigError
        let stale_after_days = parsed_or(&lookup, "REFUND_STALE_AFTER_DAYS", 180i64)?;
        let stale_after = chrono::Duration::try_days(stale_after_days)
            .filter(|d| *d >= chrono::Duration::zero())
            .ok_or(ConfigError::Invalid {
                key: "REFUND_STALE_AFTER_DAYS",
                value: stale_after_days.to_string(),
            })?;

        let grace_secs = parsed_or(&lookup, "REFUND_PENDING_RECORD_GRACE_SECS", 600i64)?;
        let pending_record_grace = chrono::Duration::try_seconds(grace_secs)
            .filter(|d| *d >= chrono::Duration::zero())
            .ok_or(ConfigError::Invalid {
                key: "REFUND_PENDING_RECORD_GRACE_SECS",
                value: grace_secs.to_string(),
            })?;

        let side_effect_max_attempts = parsed_or(&lookup, "SIDE_EFFECT_MAX_ATTEMPTS", 3u32)?.max(1);

        let policy = RefundPolicy {
            min_refund_amount,
            stale_after,
            pending_record_grace,
            gateway_timeout,
            store_timeout: Duration::from_secs(parsed_or(&lookup, "STORE_TIMEOUT_SECS", 10u64)?),
            side_effect_max_attempts,
            side_effect_retry_backoff: Duration::from_millis(parsed_or(&lookup, "SIDE_EFFECT_RETRY_MS", 200u64)?),
            persist_attempts: 3,
        };

        Ok(AppConfig {
            database_url,
            server_host,
            server_port,
            environment,
            gateway,
            notification_service_url: lookup("NOTIFICATION_SERVICE_URL")
                .unwrap_or_else(|| "http://localhost:3007".to_string()),
            notification_service_token: lookup("NOTIFICATION_SERVICE_TOKEN").filter(|t| !t.is_empty()),
            policy,
        })
    }

    // Helper cek production mode
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parsed_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

// Inisialisasi database connection pool
pub async fn init_db_pool(database_url: &str, acquire_timeout: Duration) -> Result<PgPool, sqlx::Error> {
    tracing::info!("🔌 Initializing Refund Service database connection...");

    // Parse connection options dan disable prepared statements
    let options = PgConnectOptions::from_str(database_url)?.statement_cache_capacity(0);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(acquire_timeout)
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect_with(options)
        .await?;

    tracing::info!("✅ Refund Service database pool initialized");
    Ok(pool)
}

// Health check database connection
pub async fn check_db_health(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").fetch_optional(pool).await.is_ok()
}

// Application state yang di-share ke semua handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: AppConfig,
    pub gateway: Arc<RazorpayClient>,
    pub refund_service: RefundService,
}

impl AppState {
    // Health check semua dependencies
    pub async fn health_check(&self) -> HealthStatus {
        let db_healthy = check_db_health(&self.db).await;

        HealthStatus {
            database: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
            gateway_mode: if self.gateway.is_test_mode() { "test" } else { "live" }.to_string(),
            overall: if db_healthy { "healthy" } else { "degraded" }.to_string(),
        }
    }
}

// Response untuk health check endpoint
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct HealthStatus {
    pub database: String,
    pub gateway_mode: String,
    pub overall: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/refunds"),
            ("RAZORPAY_KEY_ID", "rzp_test_1DP5mmOlF5G5ag"),
            ("RAZORPAY_KEY_SECRET", "thisissupersecret"),
            ("RAZORPAY_WEBHOOK_SECRET", "webhook-secret"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.server_port, 3009);
        assert_eq!(config.gateway.api_url, "https://api.razorpay.com/v1");
        assert_eq!(config.policy, RefundPolicy::default());
        assert!(!config.is_production());
    }

    #[test]
    fn test_missing_required_key() {
        let mut env = base_env();
        env.remove("RAZORPAY_WEBHOOK_SECRET");
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing("RAZORPAY_WEBHOOK_SECRET"));

        let mut env = base_env();
        env.insert("DATABASE_URL", "  ");
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_invalid_number() {
        let mut env = base_env();
        env.insert("REFUND_SERVICE_PORT", "eighty");
        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { key: "REFUND_SERVICE_PORT", .. }
        ));
    }

    #[test]
    fn test_policy_overrides() {
        let mut env = base_env();
        env.insert("REFUND_MIN_AMOUNT", "500");
        env.insert("REFUND_STALE_AFTER_DAYS", "90");
        env.insert("GATEWAY_TIMEOUT_SECS", "5");
        env.insert("SIDE_EFFECT_MAX_ATTEMPTS", "0");
        env.insert("RAZORPAY_KEY_ID", "rzp_live_ILgsfZCZoFIKMb");

        let config = load(&env).unwrap();
        assert_eq!(config.policy.min_refund_amount, 500);
        assert_eq!(config.policy.stale_after, chrono::Duration::days(90));
        assert_eq!(config.policy.gateway_timeout, Duration::from_secs(5));
        assert_eq!(config.gateway.timeout, Duration::from_secs(5));
        assert_eq!(config.policy.side_effect_max_attempts, 1);
        assert_eq!(config.gateway.key_id, "rzp_live_ILgsfZCZoFIKMb");
    }

    #[test]
    fn test_non_positive_minimum_rejected() {
        let mut env = base_env();
        env.insert("REFUND_MIN_AMOUNT", "0");
        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { key: "REFUND_MIN_AMOUNT", .. }
        ));
    }

    #[test]
    fn test_out_of_range_stale_window_is_rejected() {
        for raw in ["9223372036854775807", "-1"] {
            let mut env = base_env();
            env.insert("REFUND_STALE_AFTER_DAYS", raw);
            assert_eq!(
                load(&env).unwrap_err(),
                ConfigError::Invalid {
                    key: "REFUND_STALE_AFTER_DAYS",
                    value: raw.to_string(),
                }
            );
        }
    }

    #[test]
    fn test_pending_record_grace() {
        let mut env = base_env();
        env.insert("REFUND_PENDING_RECORD_GRACE_SECS", "30");
        assert_eq!(load(&env).unwrap().policy.pending_record_grace, chrono::Duration::seconds(30));

        env.insert("REFUND_PENDING_RECORD_GRACE_SECS", "-5");
        assert!(matches!(
            load(&env).unwrap_err(),
            ConfigError::Invalid { key: "REFUND_PENDING_RECORD_GRACE_SECS", .. }
        ));
    }
}
