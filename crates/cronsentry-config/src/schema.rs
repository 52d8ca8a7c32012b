//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Base directory for CronSentry state (`~/.cronsentry`).
pub fn cronsentry_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".cronsentry"))
        .unwrap_or_else(|| PathBuf::from(".cronsentry"))
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub owner: OwnerConfig,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// SQLite database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; `:memory:` keeps everything in process.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

fn default_database_path() -> PathBuf {
    cronsentry_dir().join("cronsentry.db")
}

/// Owner used when a request carries no `X-User-Id` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerConfig {
    #[serde(default = "default_owner_id")]
    pub id: String,

    #[serde(default = "default_owner_email")]
    pub email: String,

    #[serde(default = "default_owner_name")]
    pub name: String,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            id: default_owner_id(),
            email: default_owner_email(),
            name: default_owner_name(),
        }
    }
}

fn default_owner_id() -> String {
    "default-user".to_string()
}

fn default_owner_email() -> String {
    "admin@localhost".to_string()
}

fn default_owner_name() -> String {
    "Default Owner".to_string()
}

/// Missed-run detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_detector_interval")]
    pub interval_secs: u64,

    /// Reference used to recompute `next_expect` after a recovery ping:
    /// `ping_instant` or `missed_fire`.
    #[serde(default = "default_recovery_basis")]
    pub recovery_basis: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_detector_interval(),
            recovery_basis: default_recovery_basis(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_detector_interval() -> u64 {
    60
}

fn default_recovery_basis() -> String {
    "ping_instant".to_string()
}

/// Notification dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_dispatcher_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Send attempts per notification; 1 makes every failure terminal.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_base")]
    pub retry_base_secs: u64,

    #[serde(default = "default_retry_max")]
    pub retry_max_secs: u64,

    /// Link rendered at the bottom of alert emails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_dispatcher_interval(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            retry_base_secs: default_retry_base(),
            retry_max_secs: default_retry_max(),
            dashboard_url: None,
        }
    }
}

fn default_dispatcher_interval() -> u64 {
    30
}

fn default_batch_size() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    1
}

fn default_retry_base() -> u64 {
    60
}

fn default_retry_max() -> u64 {
    3600
}

/// Email transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// `log` (write alerts to the log only) or `sendgrid`.
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_from_address")]
    pub from_address: String,

    #[serde(default = "default_from_name")]
    pub from_name: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_email_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            from_address: default_from_address(),
            from_name: default_from_name(),
            api_base_url: default_api_base_url(),
            timeout_secs: default_email_timeout(),
        }
    }
}

fn default_provider() -> String {
    "log".to_string()
}

fn default_from_address() -> String {
    "alerts@cronsentry.local".to_string()
}

fn default_from_name() -> String {
    "CronSentry".to_string()
}

fn default_api_base_url() -> String {
    "https://api.sendgrid.com".to_string()
}

fn default_email_timeout() -> u64 {
    10
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for the daily rolling log files.
    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> PathBuf {
    cronsentry_dir().join("logs")
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
