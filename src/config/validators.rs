use std::net::SocketAddr;
use std::path::Path;

use super::types::SystemConfig;
use crate::types::Result;

// Validation helper functions

/// Validate listen address format (host:port)
pub(crate) fn validate_listen_address(addr: &str) -> Result<()> {
    addr.parse::<SocketAddr>()
        .map_err(|_| crate::types::Error::Validation {
            field: "server.listen".to_string(),
            message: format!("Invalid listen address format '{}'. Expected format: 'host:port' (e.g., '0.0.0.0:5001')", addr),
        })?;
    Ok(())
}

/// Validate that a directory exists
async fn validate_directory_exists(path: &str, field: &str) -> Result<()> {
    let metadata =
        tokio::fs::metadata(path)
            .await
            .map_err(|e| crate::types::Error::Validation {
                field: field.to_string(),
                message: format!("Cannot access path '{}': {}", path, e),
            })?;

    if !metadata.is_dir() {
        return Err(crate::types::Error::Validation {
            field: field.to_string(),
            message: format!("Path '{}' is not a directory", path),
        });
    }

    Ok(())
}

/// Validate positive timeout value
pub(crate) fn validate_positive_timeout(value: u64, field: &str) -> Result<()> {
    if value == 0 {
        return Err(crate::types::Error::Validation {
            field: field.to_string(),
            message: "Timeout must be greater than 0".to_string(),
        });
    }
    Ok(())
}

/// Parse size string with units (KB, MB, GB) into bytes
pub(crate) fn parse_size_string(size: &str) -> Result<u64> {
    let size = size.trim().to_uppercase();

    let (number, multiplier) = if let Some(number) = size.strip_suffix("KB") {
        (number, 1024)
    } else if let Some(number) = size.strip_suffix("MB") {
        (number, 1024 * 1024)
    } else if let Some(number) = size.strip_suffix("GB") {
        (number, 1024 * 1024 * 1024)
    } else if let Some(number) = size.strip_suffix('B') {
        (number, 1)
    } else {
        (size.as_str(), 1)
    };

    number
        .trim()
        .parse::<u64>()
        .map(|n| n * multiplier)
        .map_err(|_| crate::types::Error::Validation {
            field: "size".to_string(),
            message: format!(
                "Invalid size format '{}'. Expected format: number + unit (KB/MB/GB) or plain bytes",
                size
            ),
        })
}

/// Validate request size string and ensure reasonable limits
pub(crate) fn validate_request_size(size: &str, field: &str) -> Result<()> {
    let bytes = parse_size_string(size).map_err(|mut e| {
        if let crate::types::Error::Validation {
            field: ref mut field_ref,
            ..
        } = e
        {
            *field_ref = field.to_string();
        }
        e
    })?;

    // Minimum 1KB, maximum 100MB
    const MIN_SIZE: u64 = 1024;
    const MAX_SIZE: u64 = 100 * 1024 * 1024;

    if bytes < MIN_SIZE {
        return Err(crate::types::Error::Validation {
            field: field.to_string(),
            message: format!(
                "Request size {} bytes is below minimum {} (1KB)",
                bytes, MIN_SIZE
            ),
        });
    }

    if bytes > MAX_SIZE {
        return Err(crate::types::Error::Validation {
            field: field.to_string(),
            message: format!(
                "Request size {} bytes exceeds maximum {} (100MB)",
                bytes, MAX_SIZE
            ),
        });
    }

    Ok(())
}

/// Validate secret source values
pub(crate) fn validate_secret_source(source: &str, field: &str) -> Result<()> {
    const VALID_SOURCES: &[&str] = &["auto", "env", "file"];

    if !VALID_SOURCES.contains(&source) {
        return Err(crate::types::Error::Validation {
            field: field.to_string(),
            message: format!(
                "Invalid secret source '{}'. Must be one of: {}",
                source,
                VALID_SOURCES.join(", ")
            ),
        });
    }

    Ok(())
}

/// Validate the deploy command: a non-empty program followed by fixed arguments
pub(crate) fn validate_deploy_command(command: &[String], field: &str) -> Result<()> {
    match command.first() {
        None => Err(crate::types::Error::Validation {
            field: field.to_string(),
            message: "Deploy command cannot be empty".to_string(),
        }),
        Some(program) if program.trim().is_empty() => Err(crate::types::Error::Validation {
            field: field.to_string(),
            message: "Deploy command executable cannot be empty".to_string(),
        }),
        Some(_) => Ok(()),
    }
}

/// Validate a fully-qualified git ref such as `refs/heads/main`
pub(crate) fn validate_git_ref(git_ref: &str, field: &str) -> Result<()> {
    let valid = git_ref
        .strip_prefix("refs/")
        .map(|rest| !rest.is_empty() && !rest.contains(char::is_whitespace))
        .unwrap_or(false);

    if !valid {
        return Err(crate::types::Error::Validation {
            field: field.to_string(),
            message: format!(
                "Invalid git ref '{}'. Expected a full ref such as 'refs/heads/main'",
                git_ref
            ),
        });
    }
    Ok(())
}

/// Validate that the counter file path names a file
pub(crate) fn validate_counter_file(path: &str, field: &str) -> Result<()> {
    if path.trim().is_empty() || Path::new(path).file_name().is_none() {
        return Err(crate::types::Error::Validation {
            field: field.to_string(),
            message: format!("Counter file path '{}' does not name a file", path),
        });
    }
    Ok(())
}

impl SystemConfig {
    /// Validate the configuration
    pub async fn validate(&self) -> Result<()> {
        // Server
        validate_listen_address(&self.server.listen)?;
        validate_request_size(&self.server.max_request_size, "server.max_request_size")?;
        validate_positive_timeout(self.server.request_timeout, "server.request_timeout")?;
        validate_positive_timeout(self.server.shutdown_timeout, "server.shutdown_timeout")?;

        // Storage
        validate_counter_file(&self.storage.counter_file, "storage.counter_file")?;

        // Logging
        if !matches!(
            self.logging.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(crate::types::Error::Validation {
                field: "logging.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ),
            });
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(crate::types::Error::Validation {
                field: "logging.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Must be one of: json, pretty",
                    self.logging.format
                ),
            });
        }

        // Deploy
        validate_deploy_command(&self.deploy.command, "deploy.command")?;
        validate_positive_timeout(self.deploy.timeout, "deploy.timeout")?;
        validate_git_ref(&self.deploy.production_ref, "deploy.production_ref")?;
        if let Some(ref working_dir) = self.deploy.working_dir {
            validate_directory_exists(working_dir, "deploy.working_dir").await?;
        }

        // Monitoring
        if !self.monitoring.metrics_path.starts_with('/') {
            return Err(crate::types::Error::Validation {
                field: "monitoring.metrics_path".to_string(),
                message: format!(
                    "Metrics path '{}' must start with '/'",
                    self.monitoring.metrics_path
                ),
            });
        }

        // Secrets
        validate_secret_source(&self.secrets.source, "secrets.source")?;
        if self.secrets.source == "file" && self.secrets.secrets_file.is_none() {
            return Err(crate::types::Error::Validation {
                field: "secrets.secrets_file".to_string(),
                message: "secrets_file is required when source is 'file'".to_string(),
            });
        }

        Ok(())
    }
}
