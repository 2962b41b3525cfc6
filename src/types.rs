use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Webhook secret is not configured")]
    NotConfigured,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Application error: {0}")]
    Application(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("Config file parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Counter persistence errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read counter file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write counter file {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Counter file {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },

    #[error("Counter overflow at {value}")]
    Overflow { value: u64 },

    #[error("Counter task failed: {0}")]
    TaskFailed(String),
}

/// Deploy command execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Command '{command}' failed with exit code {code:?}")]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stdout_tail: String,
        stderr_tail: String,
    },

    #[error("Command '{command}' timed out after {timeout}s")]
    Timeout { command: String, timeout: u64 },

    #[error("Command '{command}' could not be started: {source}")]
    StartFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

/// Final status of one deploy attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployStatus {
    Succeeded,
    Failed,
    TimedOut,
}

impl DeployStatus {
    pub fn as_label(&self) -> &'static str {
        match self {
            DeployStatus::Succeeded => "succeeded",
            DeployStatus::Failed => "failed",
            DeployStatus::TimedOut => "timed_out",
        }
    }
}

/// Captured result of a completed deploy command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    pub command: Vec<String>,
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// What a successful deploy reports back to the webhook caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployResult {
    pub exit_code: Option<i32>,
    pub stdout_tail: String,
    pub stderr_tail: String,
    pub duration_ms: u64,
}
