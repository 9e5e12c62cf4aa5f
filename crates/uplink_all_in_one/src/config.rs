use common::http::{HttpLoggingConfig, HttpServerConfig};
use common::postgres::PostgresConfig;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

/// Where devices and payloads are kept
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local, lost on restart. For demos and tests.
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // HTTP configuration
    #[serde(default = "default_http_host")]
    pub http_host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Path prefixes left out of access logs and traces (comma-separated)
    #[serde(default = "default_http_ignored_paths")]
    pub http_ignored_paths: String,

    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Path to PostgreSQL migrations directory
    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    #[serde(default = "default_postgres_goose_binary_path")]
    pub postgres_goose_binary_path: String,

    // OpenTelemetry configuration
    /// OpenTelemetry OTLP endpoint (gRPC)
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    /// Time allowed for closers after shutdown starts
    #[serde(default = "default_closer_timeout_secs")]
    pub closer_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_http_ignored_paths() -> String {
    "/healthz".to_string()
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Postgres
}

fn default_postgres_host() -> String {
    PostgresConfig::default().host
}

fn default_postgres_port() -> u16 {
    PostgresConfig::default().port
}

fn default_postgres_database() -> String {
    PostgresConfig::default().database
}

fn default_postgres_username() -> String {
    PostgresConfig::default().username
}

fn default_postgres_password() -> String {
    PostgresConfig::default().password
}

fn default_postgres_max_pool_size() -> usize {
    PostgresConfig::default().max_pool_size
}

fn default_postgres_migrations_dir() -> String {
    PostgresConfig::default().migrations_dir
}

fn default_postgres_goose_binary_path() -> String {
    PostgresConfig::default().goose_binary_path
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_service_name() -> String {
    "uplink".to_string()
}

fn default_closer_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("UPLINK"))
            .build()?
            .try_deserialize()
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            migrations_dir: self.postgres_migrations_dir.clone(),
            goose_binary_path: self.postgres_goose_binary_path.clone(),
        }
    }

    pub fn http_server_config(&self) -> HttpServerConfig {
        HttpServerConfig {
            host: self.http_host.clone(),
            port: self.http_port,
            logging_config: HttpLoggingConfig::from_comma_separated(&self.http_ignored_paths),
        }
    }
}
