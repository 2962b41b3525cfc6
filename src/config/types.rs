use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::{ConfigError, Result};

/// System configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SystemConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: String,
    /// Applies to the counter routes; the webhook is bounded by `deploy.timeout`
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_counter_file")]
    pub counter_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Program followed by its fixed arguments
    #[serde(default = "default_deploy_command")]
    pub command: Vec<String>,
    pub working_dir: Option<String>,
    #[serde(default = "default_deploy_timeout")]
    pub timeout: u64,
    #[serde(default = "default_production_ref")]
    pub production_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default = "default_secrets_source")]
    pub source: String,
    pub secrets_file: Option<String>,
    #[serde(default = "default_secret_prefix")]
    pub secret_prefix: String,
    #[serde(default = "default_secret_name")]
    pub secret_name: String,
}

impl SystemConfig {
    /// Load system configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let content = std::fs::read_to_string(&path)
            .map_err(|_| ConfigError::FileNotFound { path: path_str })?;

        let config: SystemConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to built-in defaults.
    /// Used for the default config location, which is optional.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `TAPHOOK_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup; `apply_env_overrides` passes the
    /// process environment.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(listen) = lookup(ENV_LISTEN) {
            self.server.listen = listen;
        }
        if let Some(counter_file) = lookup(ENV_COUNTER_FILE) {
            self.storage.counter_file = counter_file;
        }
        if let Some(command) = lookup(ENV_DEPLOY_COMMAND) {
            self.deploy.command = command.split_whitespace().map(str::to_string).collect();
        }
        if let Some(timeout) = lookup(ENV_DEPLOY_TIMEOUT) {
            self.deploy.timeout = timeout.trim().parse().map_err(|_| ConfigError::Invalid {
                message: format!(
                    "{} must be a number of seconds, got '{}'",
                    ENV_DEPLOY_TIMEOUT, timeout
                ),
            })?;
        }
        if let Some(production_ref) = lookup(ENV_PRODUCTION_REF) {
            self.deploy.production_ref = production_ref;
        }
        Ok(())
    }
}

impl DeployConfig {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

pub const ENV_LISTEN: &str = "TAPHOOK_LISTEN";
pub const ENV_COUNTER_FILE: &str = "TAPHOOK_COUNTER_FILE";
pub const ENV_DEPLOY_COMMAND: &str = "TAPHOOK_DEPLOY_COMMAND";
pub const ENV_DEPLOY_TIMEOUT: &str = "TAPHOOK_DEPLOY_TIMEOUT";
pub const ENV_PRODUCTION_REF: &str = "TAPHOOK_PRODUCTION_REF";

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_request_size: default_max_request_size(),
            request_timeout: default_request_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            counter_file: default_counter_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            command: default_deploy_command(),
            working_dir: None,
            timeout: default_deploy_timeout(),
            production_ref: default_production_ref(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
            metrics_path: default_metrics_path(),
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            source: default_secrets_source(),
            secrets_file: None,
            secret_prefix: default_secret_prefix(),
            secret_name: default_secret_name(),
        }
    }
}

// Default value functions
fn default_listen() -> String {
    "0.0.0.0:5001".to_string()
}

fn default_max_request_size() -> String {
    "5MB".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_counter_file() -> String {
    "/data/tap_count.json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_deploy_command() -> Vec<String> {
    vec!["/opt/deploy/deploy.sh".to_string()]
}

fn default_deploy_timeout() -> u64 {
    120
}

fn default_production_ref() -> String {
    "refs/heads/main".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_secrets_source() -> String {
    "auto".to_string()
}

fn default_secret_prefix() -> String {
    "TAPHOOK".to_string()
}

fn default_secret_name() -> String {
    "webhook_secret".to_string()
}
