use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Server configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host address
    #[validate(length(min = 1, message = "HTTP host cannot be empty"))]
    pub http_host: String,

    /// HTTP server port (1-65535)
    #[validate(range(
        min = 1,
        max = 65535,
        message = "HTTP port must be between 1 and 65535"
    ))]
    pub http_port: u16,

    /// Path of the object catalog YAML file
    #[validate(length(min = 1, message = "Catalog path cannot be empty"))]
    pub catalog_path: String,

    /// Base URL of the SQL gateway fronting the relational store
    #[validate(length(min = 1, message = "Store URL cannot be empty"))]
    pub store_url: String,

    /// Basic-auth credentials for the SQL gateway
    pub store_user: Option<String>,
    pub store_password: Option<String>,

    /// TOP cap applied to unpaged queries
    #[validate(range(
        min = 1,
        max = 100_000,
        message = "Row cap must be between 1 and 100000"
    ))]
    pub row_cap: u32,

    /// Whether the mimic cache is consulted and written
    pub cache_enabled: bool,

    /// Bound of the background cache write queue
    #[validate(range(
        min = 1,
        max = 100_000,
        message = "Cache queue capacity must be between 1 and 100000"
    ))]
    pub cache_queue_capacity: usize,

    /// Workers draining the cache write queue
    #[validate(range(
        min = 1,
        max = 64,
        message = "Cache write workers must be between 1 and 64"
    ))]
    pub cache_write_workers: usize,

    /// Base URL of the survey web service; None disables the source
    pub provider_base_url: Option<String>,

    /// Per-request timeout for provider calls
    #[validate(range(
        min = 1,
        max = 600,
        message = "Provider timeout must be between 1 and 600 seconds"
    ))]
    pub provider_timeout_secs: u64,

    /// Instance ids never served from the cache snapshot on spatial
    /// fallback
    pub spatial_blacklist: Vec<String>,

    /// Whole-request timeout enforced by the HTTP layer
    #[validate(range(
        min = 1,
        max = 600,
        message = "Request timeout must be between 1 and 600 seconds"
    ))]
    pub request_timeout_secs: u64,

    /// Whether to run server in daemon mode
    pub daemon: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            catalog_path: "catalog.yaml".to_string(),
            store_url: "http://localhost:8123".to_string(),
            store_user: None,
            store_password: None,
            row_cap: 1000,
            cache_enabled: true,
            cache_queue_capacity: 256,
            cache_write_workers: 2,
            provider_base_url: None,
            provider_timeout_secs: 30,
            spatial_blacklist: Vec::new(),
            request_timeout_secs: 60,
            daemon: false,
        }
    }
}

impl ServerConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::build_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from CLI arguments with validation. Store
    /// and provider settings have no flags and keep their environment
    /// values.
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let mut config = Self::build_from_env()?;
        config.http_host = cli.http_host;
        config.http_port = cli.http_port;
        config.catalog_path = cli.catalog_path;
        config.row_cap = cli.row_cap;
        config.cache_enabled = !cli.disable_cache;
        config.daemon = cli.daemon;

        config.validate()?;
        Ok(config)
    }

    fn build_from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            http_host: env::var("GEOFED_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: parse_env_var("GEOFED_PORT", "8080")?,
            catalog_path: env::var("GEOFED_CATALOG").unwrap_or_else(|_| "catalog.yaml".to_string()),
            store_url: env::var("GEOFED_STORE_URL")
                .unwrap_or_else(|_| "http://localhost:8123".to_string()),
            store_user: env::var("GEOFED_STORE_USER").ok(),
            store_password: env::var("GEOFED_STORE_PASSWORD").ok(),
            row_cap: parse_env_var("GEOFED_ROW_CAP", "1000")?,
            cache_enabled: parse_env_var("GEOFED_CACHE_ENABLED", "true")?,
            cache_queue_capacity: parse_env_var("GEOFED_CACHE_QUEUE_CAPACITY", "256")?,
            cache_write_workers: parse_env_var("GEOFED_CACHE_WRITE_WORKERS", "2")?,
            provider_base_url: env::var("GEOFED_PROVIDER_URL").ok(),
            provider_timeout_secs: parse_env_var("GEOFED_PROVIDER_TIMEOUT_SECS", "30")?,
            spatial_blacklist: parse_id_list(
                &env::var("GEOFED_SPATIAL_BLACKLIST").unwrap_or_default(),
            ),
            request_timeout_secs: parse_env_var("GEOFED_REQUEST_TIMEOUT_SECS", "60")?,
            daemon: false, // Environment-based config always runs in foreground
        })
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug)]
pub struct CliConfig {
    pub http_host: String,
    pub http_port: u16,
    pub catalog_path: String,
    pub row_cap: u32,
    pub disable_cache: bool,
    pub daemon: bool,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

/// Comma-separated id list, empty entries dropped
fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
