//! Application configuration loaded from environment variables.

use std::time::Duration;

use chrono::TimeDelta;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`, `RUST_LOG`: bind address and log filter
/// - `DATABASE_URL`: PostgreSQL connection string; unset selects the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size
/// - `PAYMENT_SERVICE_URL`, `PAYMENT_SHOP_ID`, `PAYMENT_API_KEY`
/// - `SHIPMENT_SERVICE_URL`, `SHIPMENT_API_TOKEN`
/// - `EXTERNAL_SERVICE_TIMEOUT_SECS`: per-call timeout for both services
/// - `FAKE_EXTERNAL_SERVICES`: use in-memory payment and carrier fakes
/// - `BUMP_INTERVAL_SECS`: minimum seconds between bumps by one seller
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub payment_url: String,
    pub payment_shop_id: String,
    pub payment_api_key: String,
    pub shipment_url: String,
    pub shipment_api_token: String,
    pub external_timeout: Duration,
    pub fake_external_services: bool,
    pub bump_interval_secs: i64,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: var_or("HOST", &defaults.host),
            port: parsed_or("PORT", defaults.port),
            log_level: var_or("RUST_LOG", &defaults.log_level),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            database_max_connections: parsed_or(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            payment_url: var_or("PAYMENT_SERVICE_URL", &defaults.payment_url),
            payment_shop_id: var_or("PAYMENT_SHOP_ID", &defaults.payment_shop_id),
            payment_api_key: var_or("PAYMENT_API_KEY", &defaults.payment_api_key),
            shipment_url: var_or("SHIPMENT_SERVICE_URL", &defaults.shipment_url),
            shipment_api_token: var_or("SHIPMENT_API_TOKEN", &defaults.shipment_api_token),
            external_timeout: Duration::from_secs(parsed_or(
                "EXTERNAL_SERVICE_TIMEOUT_SECS",
                defaults.external_timeout.as_secs(),
            )),
            fake_external_services: parsed_or(
                "FAKE_EXTERNAL_SERVICES",
                defaults.fake_external_services,
            ),
            bump_interval_secs: parsed_or("BUMP_INTERVAL_SECS", defaults.bump_interval_secs),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the bump rate limit as a duration.
    pub fn bump_interval(&self) -> TimeDelta {
        TimeDelta::seconds(self.bump_interval_secs.max(0))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            payment_url: "http://localhost:5555".to_string(),
            payment_shop_id: "11".to_string(),
            payment_api_key: String::new(),
            shipment_url: "http://localhost:7000".to_string(),
            shipment_api_token: String::new(),
            external_timeout: Duration::from_secs(10),
            fake_external_services: false,
            bump_interval_secs: domain::policy::DEFAULT_BUMP_INTERVAL_SECS,
        }
    }
}
