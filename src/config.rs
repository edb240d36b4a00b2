use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::i18n::Locale;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_TRACKING_RATE_LIMIT_REQUESTS: u32 = 10;
const DEFAULT_TRACKING_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_RATE_LIMIT_NAMESPACE: &str = "delivery:rl";
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PUSH_MAX_ATTEMPTS: u32 = 2;
const DEFAULT_DOCUMENT_STORAGE_ROOT: &str = "storage/documents";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Redis connection URL; enables the shared rate-limit store when set
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Public tracking search: attempts allowed per client address per window
    #[serde(default = "default_tracking_rate_limit_requests")]
    #[validate(range(min = 1))]
    pub tracking_rate_limit_requests: u32,

    /// Public tracking search: window size (seconds)
    #[serde(default = "default_tracking_rate_limit_window_secs")]
    #[validate(range(min = 1))]
    pub tracking_rate_limit_window_secs: u64,

    /// Keep rate-limit counters in Redis instead of process memory
    #[serde(default)]
    pub rate_limit_use_redis: bool,

    /// Namespace for rate limiter keys when Redis is enabled
    #[serde(default = "default_rate_limit_namespace")]
    pub rate_limit_namespace: String,

    /// Domain event channel capacity
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 16, max = 1048576))]
    pub event_channel_capacity: usize,

    /// Push provider endpoint; notifications are only logged when unset
    #[serde(default)]
    pub push_endpoint: Option<String>,

    /// Push provider API key, sent as a bearer token
    #[serde(default)]
    pub push_api_key: Option<String>,

    #[serde(default = "default_push_timeout_secs")]
    pub push_timeout_secs: u64,

    #[serde(default = "default_push_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub push_max_attempts: u32,

    /// Directory that shipment document paths are resolved against
    #[serde(default = "default_document_storage_root")]
    pub document_storage_root: String,

    /// Locale used when a request does not send Accept-Language
    #[serde(default)]
    pub default_locale: Locale,
}

impl AppConfig {
    /// Builds a configuration with defaults for everything but the essentials.
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            redis_url: None,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            tracking_rate_limit_requests: default_tracking_rate_limit_requests(),
            tracking_rate_limit_window_secs: default_tracking_rate_limit_window_secs(),
            rate_limit_use_redis: false,
            rate_limit_namespace: default_rate_limit_namespace(),
            event_channel_capacity: default_event_channel_capacity(),
            push_endpoint: None,
            push_api_key: None,
            push_timeout_secs: default_push_timeout_secs(),
            push_max_attempts: default_push_max_attempts(),
            document_storage_root: default_document_storage_root(),
            default_locale: Locale::default(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn tracking_rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.tracking_rate_limit_window_secs)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_tracking_rate_limit_requests() -> u32 {
    DEFAULT_TRACKING_RATE_LIMIT_REQUESTS
}
fn default_tracking_rate_limit_window_secs() -> u64 {
    DEFAULT_TRACKING_RATE_LIMIT_WINDOW_SECS
}
fn default_rate_limit_namespace() -> String {
    DEFAULT_RATE_LIMIT_NAMESPACE.to_string()
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn default_push_timeout_secs() -> u64 {
    DEFAULT_PUSH_TIMEOUT_SECS
}
fn default_push_max_attempts() -> u32 {
    DEFAULT_PUSH_MAX_ATTEMPTS
}

fn default_document_storage_root() -> String {
    DEFAULT_DOCUMENT_STORAGE_ROOT.to_string()
}

fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new("invalid_log_level")),
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("delivery_tracking={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://delivery.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    if app_config.rate_limit_use_redis && app_config.redis_url.is_none() {
        let mut errors = validator::ValidationErrors::new();
        errors.add("redis_url", ValidationError::new("required_for_redis_rate_limit"));
        return Err(AppConfigError::Validation(errors));
    }

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        )
    }

    #[test]
    fn defaults_match_public_search_policy() {
        let cfg = base_config();
        assert_eq!(cfg.tracking_rate_limit_requests, 10);
        assert_eq!(cfg.tracking_rate_limit_window(), Duration::from_secs(60));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut cfg = base_config();
        cfg.log_level = "verbose".into();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("log_level"));
    }

    #[test]
    fn rejects_zero_rate_limit() {
        let mut cfg = base_config();
        cfg.tracking_rate_limit_requests = 0;
        assert!(cfg.validate().is_err());
    }
}
