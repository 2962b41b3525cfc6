use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tokio::signal;
use tracing::{error, info, instrument, warn};

use crate::config::SystemConfig;
use crate::secrets::SecretManager;
use crate::state::CounterStore;
use crate::types::Result;

/// Config path used when `-c` is not given; it may be absent
pub const DEFAULT_CONFIG_PATH: &str = "/etc/taphook/config.toml";

#[derive(Parser)]
#[command(name = "taphook")]
#[command(about = "Tap counter with a signed GitHub deploy webhook")]
#[command(long_about = "
A single-binary HTTP service that counts visits to /tap, persists the count
to a JSON file and runs a local deploy command when GitHub reports a push
to the production branch.
")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// System configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run the HTTP server (default if no subcommand given)
    Run(RunArgs),
    /// Validate the configuration file and secret source
    Validate,
    /// Show version and build information
    Version,
}

#[derive(Args, Clone, Default)]
pub struct RunArgs {
    /// Override listen address (format: "host:port")
    #[arg(long)]
    pub listen: Option<String>,

    /// Set log format
    #[arg(long)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Get effective log level considering verbose/quiet flags
    pub fn effective_log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else if self.quiet {
            LogLevel::Error
        } else {
            self.log_level.clone().unwrap_or(LogLevel::Info)
        }
    }

    pub fn log_level_to_str(&self) -> &'static str {
        match self.effective_log_level() {
            LogLevel::Trace => crate::logging::level::TRACE,
            LogLevel::Debug => crate::logging::level::DEBUG,
            LogLevel::Info => crate::logging::level::INFO,
            LogLevel::Warn => crate::logging::level::WARN,
            LogLevel::Error => crate::logging::level::ERROR,
        }
    }

    /// `None` unless a level flag was given, so the config file can decide
    pub fn log_level_override(&self) -> Option<&'static str> {
        if self.log_level.is_some() || self.verbose || self.quiet {
            Some(self.log_level_to_str())
        } else {
            None
        }
    }

    /// Get log format override from CLI arguments
    pub fn log_format_override(&self) -> Option<&'static str> {
        match &self.command {
            Some(Commands::Run(args)) => args.log_format.as_ref().map(|fmt| match fmt {
                LogFormat::Json => crate::logging::format::JSON,
                LogFormat::Pretty => crate::logging::format::PRETTY,
            }),
            _ => None,
        }
    }
}

/// Load the config file with env overrides applied
///
/// A missing file at the default path falls back to built-in defaults; a
/// missing file given with `-c` is an error.
pub fn load_config(cli: &Cli) -> Result<SystemConfig> {
    let mut config = if cli.config == Path::new(DEFAULT_CONFIG_PATH) {
        SystemConfig::load_or_default(&cli.config)?
    } else {
        SystemConfig::load_from_file(&cli.config)?
    };
    config.apply_env_overrides()?;
    Ok(config)
}

/// Run the HTTP server
#[instrument(skip_all)]
pub async fn run_server(cli: Cli, args: RunArgs, system_config: Option<SystemConfig>) -> Result<()> {
    let mut system_config = match system_config {
        Some(config) => config,
        None => load_config(&cli)?,
    };

    if let Some(listen) = args.listen {
        system_config.server.listen = listen;
    }

    system_config.validate().await?;

    info!(
        config_path = %cli.config.display(),
        "Configuration loaded successfully"
    );

    let secret_manager = SecretManager::new(system_config.secrets.clone()).await?;
    let webhook_secret = secret_manager.load_webhook_secret().await?;

    info!(
        loaders = ?secret_manager.get_loader_names(),
        webhook_enabled = webhook_secret.is_some(),
        "Secret manager initialized"
    );

    info!(
        listen = %system_config.server.listen,
        counter_file = %system_config.storage.counter_file,
        "Starting server"
    );

    crate::http::start_server(system_config, webhook_secret, setup_shutdown_signal()).await
}

/// Validate the configuration file, counter file and secret source
#[instrument(skip_all)]
pub async fn validate_config(cli: Cli, system_config: Option<SystemConfig>) -> Result<()> {
    info!("Validating configuration...");

    let config = match system_config {
        Some(config) => config,
        None => load_config(&cli)?,
    };

    if let Err(e) = config.validate().await {
        error!(
            config_path = %cli.config.display(),
            error = %e,
            "System configuration validation failed"
        );
        return Err(e);
    }
    info!(config_path = %cli.config.display(), "System configuration is valid");

    let counter_path = config.storage.counter_file.clone();
    match tokio::task::spawn_blocking(move || CounterStore::open(counter_path)).await {
        Ok(Ok(store)) => info!(
            counter_file = %store.path().display(),
            count = store.read(),
            "Counter file is readable"
        ),
        Ok(Err(e)) => {
            error!(error = %e, "Counter file check failed");
            return Err(e);
        }
        Err(e) => {
            return Err(crate::types::Error::Application(format!(
                "Counter check task failed: {}",
                e
            )))
        }
    }

    let secret_manager = match SecretManager::new(config.secrets.clone()).await {
        Ok(manager) => manager,
        Err(e) => {
            error!(error = %e, "Failed to initialize secret manager");
            return Err(e);
        }
    };

    match secret_manager.load_webhook_secret().await? {
        Some(_) => info!("Webhook secret is configured"),
        None => warn!("Webhook secret is not configured, /github-webhook will answer 503"),
    }

    info!("Configuration is valid");
    Ok(())
}

/// Show version and build information
#[instrument]
pub async fn show_version() -> Result<()> {
    println!("taphook {}", env!("CARGO_PKG_VERSION"));
    println!("Description: {}", env!("CARGO_PKG_DESCRIPTION"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
    println!();

    println!("Build Information:");
    println!(
        "  Build Profile: {}",
        if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        }
    );
    println!();

    println!("Runtime Information:");
    println!("  Platform: {}", std::env::consts::OS);
    println!("  Architecture: {}", std::env::consts::ARCH);

    Ok(())
}

/// Resolve on SIGINT or SIGTERM
pub async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
