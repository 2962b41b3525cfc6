//! Structured logging setup and span helpers
//!
//! Output is JSON or pretty text. The level comes from the CLI, then the
//! config file, then `info`; `RUST_LOG` overrides all of them when set.

use tracing::{info_span, Span};
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};

use crate::config::SystemConfig;
use crate::types::Result;

/// Span wrapping one webhook delivery
pub fn webhook_delivery_span(delivery_id: &str, event: &str) -> Span {
    info_span!("webhook_delivery", delivery_id = delivery_id, event = event)
}

/// Span wrapping one deploy run
pub fn deploy_span(git_ref: &str, after: Option<&str>) -> Span {
    info_span!("deploy", git_ref = git_ref, after = after.unwrap_or("unknown"))
}

/// Log level enum values as strings for configuration
pub mod level {
    pub const TRACE: &str = "trace";
    pub const DEBUG: &str = "debug";
    pub const INFO: &str = "info";
    pub const WARN: &str = "warn";
    pub const ERROR: &str = "error";
}

/// Log format enum values as strings for configuration
pub mod format {
    pub const JSON: &str = "json";
    pub const PRETTY: &str = "pretty";
}

/// Initialize the global tracing subscriber
///
/// Precedence is CLI override, then `system_config`, then the defaults
/// (`info`, `json`).
pub fn init(
    log_level_override: Option<&str>,
    log_format_override: Option<&str>,
    system_config: Option<&SystemConfig>,
) -> Result<()> {
    let log_level = log_level_override
        .or(system_config.map(|c| c.logging.level.as_str()))
        .unwrap_or(level::INFO);

    let log_format = log_format_override
        .or(system_config.map(|c| c.logging.format.as_str()))
        .unwrap_or(format::JSON);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string());

    let result = match log_format {
        format::PRETTY => tracing_subscriber::fmt()
            .pretty()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .json()
            .with_timer(timer)
            .with_env_filter(env_filter)
            .with_target(false)
            .with_current_span(true)
            .with_span_list(false)
            .try_init(),
    };

    result.map_err(|e| crate::types::Error::Application(format!("Failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_delivery_span_creation() {
        let span = webhook_delivery_span("72d3162e-cc78-11e3-81ab-4c9367dc0958", "push");
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "webhook_delivery");
        }
        let _guard = span.enter();
    }

    #[test]
    fn test_deploy_span_creation() {
        let span = deploy_span("refs/heads/main", None);
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "deploy");
        }
        let _guard = span.enter();
    }

    #[test]
    fn test_level_constants() {
        assert_eq!(level::TRACE, "trace");
        assert_eq!(level::ERROR, "error");
    }

    #[test]
    fn test_format_constants() {
        assert_eq!(format::JSON, "json");
        assert_eq!(format::PRETTY, "pretty");
    }
}
