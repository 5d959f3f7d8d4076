//! store-api configuration
//!
//! Read once at startup from the environment (optionally seeded by a `.env`
//! file). No runtime reload.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

use crate::bootstrap::{DependencyPolicy, OnExhausted, RetryPolicy};
use crate::error::StartupError;
use crate::sanitize::ProductIdPolicy;

/// How order-created notifications leave the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyMode {
    /// Publish right after the insert, in the request path (best effort)
    #[default]
    Direct,
    /// Write an outbox row in the insert transaction; the relay publishes it
    Outbox,
}

impl FromStr for NotifyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "outbox" => Ok(Self::Outbox),
            other => Err(format!("unknown notify mode: {other}")),
        }
    }
}

/// Relational store settings
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Full URL (env: DATABASE_URL); overrides the individual parts
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    pub connect: RetryPolicy,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        if let Some(url) = &self.url {
            return url.parse();
        }
        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name))
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .field("connect", &self.connect)
            .finish()
    }
}

/// Publish/subscribe channel settings
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub connect: DependencyPolicy,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    /// Channel order-created notifications are published on
    pub orders_channel: String,
    pub notify_mode: NotifyMode,
    pub outbox_poll_interval: Duration,
    pub outbox_batch_size: i64,
    pub product_id_policy: ProductIdPolicy,
    /// HTTP listening port (env: PORT)
    pub http_port: u16,
}

impl Config {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StartupError> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jitter = Duration::from_millis(parse_value(&get, "CONNECT_RETRY_JITTER_MS", 0u64)?);

        let database = DatabaseConfig {
            url: get("DATABASE_URL"),
            host: text("DB_HOST", "localhost"),
            port: parse_value(&get, "DB_PORT", 5432)?,
            user: text("DB_USER", "postgres"),
            password: get("DB_PASSWORD").unwrap_or_default(),
            name: text("DB_NAME", "postgres"),
            max_connections: parse_value(&get, "DB_MAX_CONNECTIONS", 10)?,
            connect: RetryPolicy::new(
                parse_value(&get, "DB_CONNECT_MAX_ATTEMPTS", 10)?,
                Duration::from_secs(parse_value(&get, "DB_CONNECT_INTERVAL_SECS", 2)?),
            )
            .with_jitter(jitter),
        };

        let redis_required: bool = parse_value(&get, "REDIS_REQUIRED", true)?;
        let redis = RedisConfig {
            host: text("REDIS_HOST", "localhost"),
            port: parse_value(&get, "REDIS_PORT", 6379)?,
            connect: DependencyPolicy {
                retry: RetryPolicy::new(
                    parse_value(&get, "REDIS_CONNECT_MAX_ATTEMPTS", 1)?,
                    Duration::from_secs(parse_value(&get, "REDIS_CONNECT_INTERVAL_SECS", 2)?),
                )
                .with_jitter(jitter),
                on_exhausted: if redis_required {
                    OnExhausted::Fatal
                } else {
                    OnExhausted::Degrade
                },
            },
        };

        let outbox_batch_size: i64 = parse_value(&get, "OUTBOX_BATCH_SIZE", 100)?;
        if outbox_batch_size <= 0 {
            return Err(StartupError::Config("OUTBOX_BATCH_SIZE must be positive".into()));
        }

        Ok(Self {
            database,
            redis,
            orders_channel: text("ORDERS_CHANNEL", shared::order::ORDERS_CHANNEL),
            notify_mode: parse_value(&get, "NOTIFY_MODE", NotifyMode::Direct)?,
            outbox_poll_interval: Duration::from_millis(parse_value(
                &get,
                "OUTBOX_POLL_INTERVAL_MS",
                500,
            )?),
            outbox_batch_size,
            product_id_policy: parse_value(&get, "PRODUCT_ID_POLICY", ProductIdPolicy::Denylist)?,
            http_port: parse_value(&get, "PORT", 8080)?,
        })
    }

    /// Outbox channel for the store, `None` in direct mode
    pub fn outbox_channel(&self) -> Option<&str> {
        match self.notify_mode {
            NotifyMode::Direct => None,
            NotifyMode::Outbox => Some(&self.orders_channel),
        }
    }
}

fn parse_value<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, StartupError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| StartupError::Config(format!("{key}={raw:?}: {e}"))),
        None => Ok(default),
    }
}
