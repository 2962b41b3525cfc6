//! Deploy serialization
//!
//! `DeploymentManager` runs at most one deploy at a time. Callers that arrive
//! while a deploy is running wait in FIFO order on the deploy lock and then run
//! their own deploy; nothing is rejected or coalesced.
//!
//! Each deploy runs on its own task. A caller that goes away (a webhook client
//! hanging up) stops waiting for the result but never stops the deploy; only
//! the deploy timeout does that.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn, Instrument, Span};

use crate::config::DeployConfig;
use crate::execution::{tail_text, CommandExecutor, TAIL_BYTES};
use crate::metrics;
use crate::types::{CommandOutput, DeployResult, DeployStatus, Error, ExecutionError, Result};

/// Runs the deploy command once
#[async_trait::async_trait]
pub trait DeployInvoker: Send + Sync {
    /// Run the deploy, failing with `ExecutionError` on timeout or non-zero exit
    async fn run_deploy(&self, timeout: Duration) -> Result<CommandOutput>;

    /// Human readable command line for logs
    fn describe(&self) -> String;
}

/// Invokes the configured deploy script
pub struct ScriptInvoker {
    command: Vec<String>,
    working_dir: Option<String>,
}

impl ScriptInvoker {
    pub fn new(command: Vec<String>, working_dir: Option<String>) -> Self {
        Self {
            command,
            working_dir,
        }
    }

    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(config.command.clone(), config.working_dir.clone())
    }
}

#[async_trait::async_trait]
impl DeployInvoker for ScriptInvoker {
    async fn run_deploy(&self, timeout: Duration) -> Result<CommandOutput> {
        CommandExecutor::new(timeout, self.working_dir.as_deref())
            .execute(&self.command)
            .await
    }

    fn describe(&self) -> String {
        self.command.join(" ")
    }
}

/// Clears the in-progress flag even if the deploy future is dropped
struct RunningFlag<'a>(&'a AtomicBool);

impl<'a> RunningFlag<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// DeploymentManager serializes deploys behind a fair async mutex
pub struct DeploymentManager {
    invoker: Arc<dyn DeployInvoker>,
    timeout: Duration,
    lock: Mutex<()>,
    running: AtomicBool,
}

impl DeploymentManager {
    pub fn new(invoker: Arc<dyn DeployInvoker>, timeout: Duration) -> Self {
        Self {
            invoker,
            timeout,
            lock: Mutex::new(()),
            running: AtomicBool::new(false),
        }
    }

    /// Manager backed by the configured deploy script
    pub fn from_config(config: &DeployConfig) -> Self {
        Self::new(
            Arc::new(ScriptInvoker::from_config(config)),
            config.timeout_duration(),
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a deploy command is running right now
    pub fn is_deploying(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait for any running deploy to finish, then run one
    ///
    /// Dropping the returned future detaches the deploy instead of cancelling it.
    pub async fn run_deploy(self: &Arc<Self>) -> Result<DeployResult> {
        let manager = Arc::clone(self);
        let task = tokio::spawn(
            async move { manager.run_serialized().await }.instrument(Span::current()),
        );

        task.await.map_err(|e| {
            error!(error = %e, "Deploy task failed");
            Error::Application(format!("Deploy task failed: {}", e))
        })?
    }

    async fn run_serialized(&self) -> Result<DeployResult> {
        let waiting = metrics::WaitingGuard::new();
        if self.is_deploying() {
            info!("Deploy already running, waiting for it to finish");
        }
        let _lock = self.lock.lock().await;
        drop(waiting);

        let _running = RunningFlag::set(&self.running);
        let _metrics_guard = metrics::DeploymentMetricsGuard::new();
        let command = self.invoker.describe();

        info!(
            command = %command,
            timeout_secs = self.timeout.as_secs(),
            "Starting deploy"
        );

        let started = Instant::now();
        let result = self.invoker.run_deploy(self.timeout).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                metrics::record_deployment_complete(DeployStatus::Succeeded, duration_ms);
                info!(
                    command = %command,
                    duration_ms = duration_ms,
                    "Deploy succeeded"
                );
                Ok(DeployResult {
                    exit_code: output.exit_code,
                    stdout_tail: tail_text(&output.stdout, TAIL_BYTES),
                    stderr_tail: tail_text(&output.stderr, TAIL_BYTES),
                    duration_ms,
                })
            }
            Err(e @ Error::Execution(ExecutionError::Timeout { .. })) => {
                metrics::record_deployment_complete(DeployStatus::TimedOut, duration_ms);
                warn!(
                    command = %command,
                    duration_ms = duration_ms,
                    "Deploy timed out"
                );
                Err(e)
            }
            Err(e) => {
                metrics::record_deployment_complete(DeployStatus::Failed, duration_ms);
                error!(
                    command = %command,
                    duration_ms = duration_ms,
                    error = %e,
                    "Deploy failed"
                );
                Err(e)
            }
        }
    }
}
