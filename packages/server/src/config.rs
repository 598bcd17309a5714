use std::time::Duration;

use common::storage::S3Settings;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "STAGEHAND_CONFIG";

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// `postgres://...` in production, `sqlite://path?mode=rwc` for local runs.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Applies to both connecting and acquiring a pooled connection. Default: 8.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Log every SQL statement at debug level.
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    1
}
fn default_acquire_timeout_secs() -> u64 {
    8
}

impl DatabaseConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            sqlx_logging: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    /// Bearer token required by the admin endpoints. Admin routes reject
    /// every request while this is unset.
    #[serde(default)]
    pub admin_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    S3,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Base directory of the filesystem backend. Default: "./data/objects".
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Largest accepted object in bytes. Default: 50 MiB.
    #[serde(default = "default_max_object_size")]
    pub max_object_size: u64,
    /// Per-call bound on existence checks during reconciliation. Default: 10.
    #[serde(default = "default_check_timeout_secs")]
    pub check_timeout_secs: u64,
    #[serde(default)]
    pub s3: S3Settings,
}

fn default_storage_path() -> String {
    "./data/objects".into()
}
fn default_max_object_size() -> u64 {
    50 * 1024 * 1024
}
fn default_check_timeout_secs() -> u64 {
    10
}

impl StorageConfig {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
            max_object_size: default_max_object_size(),
            check_timeout_secs: default_check_timeout_secs(),
            s3: S3Settings::default(),
        }
    }
}

/// Garbage collection of orphaned originals and stuck staged images.
#[derive(Debug, Deserialize, Clone)]
pub struct GcConfig {
    /// Run the background sweeper in the server. Default: true.
    #[serde(default = "default_gc_enabled")]
    pub enabled: bool,
    /// Minimum age of a zero-reference original before the sweep removes it. Default: 24h.
    #[serde(default = "default_orphan_grace_period_secs")]
    pub orphan_grace_period_secs: u64,
    /// Originals removed per sweep. Default: 100.
    #[serde(default = "default_orphan_batch_limit")]
    pub orphan_batch_limit: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Age after which a `queued` staged image counts as stuck. Default: 1.
    #[serde(default = "default_stuck_queued_hours")]
    pub stuck_queued_hours: u64,
}

fn default_gc_enabled() -> bool {
    true
}
fn default_orphan_grace_period_secs() -> u64 {
    24 * 60 * 60
}
fn default_orphan_batch_limit() -> u64 {
    100
}
fn default_sweep_interval_secs() -> u64 {
    60 * 60
}
fn default_stuck_queued_hours() -> u64 {
    1
}

impl GcConfig {
    pub fn orphan_grace_period(&self) -> Duration {
        Duration::from_secs(self.orphan_grace_period_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            enabled: default_gc_enabled(),
            orphan_grace_period_secs: default_orphan_grace_period_secs(),
            orphan_batch_limit: default_orphan_batch_limit(),
            sweep_interval_secs: default_sweep_interval_secs(),
            stuck_queued_hours: default_stuck_queued_hours(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconcileConfig {
    #[serde(default = "default_reconcile_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_reconcile_concurrency")]
    pub concurrency: usize,
}

fn default_reconcile_batch_size() -> u64 {
    100
}
fn default_reconcile_concurrency() -> usize {
    10
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            batch_size: default_reconcile_batch_size(),
            concurrency: default_reconcile_concurrency(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub gc: GcConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config/config".into());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("database.url", "sqlite://./data/stagehand.db?mode=rwc")?
            // Load from config/config.toml
            .add_source(File::with_name(path).required(false))
            // Override from environment (e.g., STAGEHAND__DATABASE__URL)
            .add_source(Environment::with_prefix("STAGEHAND").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
