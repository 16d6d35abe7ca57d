use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::core::LifecycleSettings;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_heart_cost")]
    pub heart_cost: i32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            heart_cost: default_heart_cost(),
        }
    }
}

fn default_heart_cost() -> i32 { 1 }

/// Which notifier the service delivers through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierBackend {
    Slack,
    Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_backend")]
    pub backend: NotifierBackend,
    #[serde(default)]
    pub slack_webhook_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_bulk_concurrency")]
    pub bulk_concurrency: usize,
    #[serde(default = "default_bulk_batch_size")]
    pub bulk_batch_size: usize,
    /// Zero disables the background sweep
    #[serde(default)]
    pub sweep_interval_secs: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            slack_webhook_url: None,
            timeout_ms: default_timeout_ms(),
            bulk_concurrency: default_bulk_concurrency(),
            bulk_batch_size: default_bulk_batch_size(),
            sweep_interval_secs: 0,
        }
    }
}

impl NotificationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

fn default_backend() -> NotifierBackend { NotifierBackend::Log }
fn default_timeout_ms() -> u64 { 3000 }
fn default_bulk_concurrency() -> usize { 8 }
fn default_bulk_batch_size() -> usize { 500 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with MATCHD)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., MATCHD__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("MATCHD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the lifecycle manager cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lifecycle.heart_cost < 1 {
            return Err(ConfigError::Message(format!(
                "lifecycle.heart_cost must be at least 1, got {}",
                self.lifecycle.heart_cost
            )));
        }
        Ok(())
    }

    /// Lifecycle manager tunables derived from this configuration
    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            heart_cost: self.lifecycle.heart_cost,
            notify_timeout: self.notifications.timeout(),
            bulk_concurrency: self.notifications.bulk_concurrency,
            bulk_batch_size: self.notifications.bulk_batch_size,
        }
    }
}

/// Apply the well-known unprefixed variables
///
/// `DATABASE_URL` and `SLACK_WEBHOOK_URL` win over anything in the files.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(database_url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", database_url)?;
    }
    if let Ok(webhook) = env::var("SLACK_WEBHOOK_URL") {
        builder = builder.set_override("notifications.slack_webhook_url", webhook)?;
    }

    builder.build()
}
