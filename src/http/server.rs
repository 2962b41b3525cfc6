//! HTTP server setup, routing and graceful shutdown

use axum::{
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::{
    future::IntoFuture,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::{net::TcpListener, sync::Notify};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

use crate::{
    config::{parse_size_string, SystemConfig},
    deployment::DeploymentManager,
    http::{handlers::*, middleware::webhook_auth_middleware},
    secrets::SecureString,
    state::CounterStore,
    types::{ConfigError, Error, Result},
};

/// Build the application state and serve until `shutdown_signal` resolves
#[instrument(skip_all)]
pub async fn start_server(
    config: SystemConfig,
    webhook_secret: Option<SecureString>,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let counter_path = config.storage.counter_file.clone();
    let counter = tokio::task::spawn_blocking(move || CounterStore::open(counter_path))
        .await
        .map_err(|e| Error::Application(format!("Counter initialization task failed: {}", e)))??;

    info!(
        counter_file = %counter.path().display(),
        count = counter.read(),
        "Counter store ready"
    );

    let deployer = DeploymentManager::from_config(&config.deploy);

    info!(
        command = ?config.deploy.command,
        timeout_secs = config.deploy.timeout,
        production_ref = %config.deploy.production_ref,
        webhook_enabled = webhook_secret.is_some(),
        "Deployment manager initialized"
    );

    let app_state = Arc::new(AppState {
        config: config.clone(),
        counter: Arc::new(counter),
        deployer: Arc::new(deployer),
        webhook_secret: webhook_secret.map(Arc::new),
        start_time: SystemTime::now(),
    });

    let router = create_router(app_state)?;
    let addr = parse_listen_address(&config.server.listen)?;

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!(
            error = %e,
            addr = %addr,
            "Failed to bind to address"
        );
        Error::Io(e)
    })?;

    info!(
        local_addr = %listener.local_addr().unwrap_or(addr),
        max_request_size = %config.server.max_request_size,
        request_timeout = config.server.request_timeout,
        "HTTP server listening"
    );

    let shutdown_started = Arc::new(Notify::new());
    let server = axum::serve(listener, router)
        .with_graceful_shutdown({
            let shutdown_started = shutdown_started.clone();
            async move {
                shutdown_signal.await;
                info!("Shutdown signal received, starting graceful shutdown");
                shutdown_started.notify_one();
            }
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return finish(result),
        _ = shutdown_started.notified() => {}
    }

    // In-flight deploys get `shutdown_timeout` to finish
    let grace = Duration::from_secs(config.server.shutdown_timeout);
    match tokio::time::timeout(grace, server).await {
        Ok(result) => finish(result),
        Err(_) => {
            warn!(
                shutdown_timeout = config.server.shutdown_timeout,
                "Graceful shutdown timed out, dropping open connections"
            );
            Ok(())
        }
    }
}

fn finish(result: std::io::Result<()>) -> Result<()> {
    match result {
        Ok(()) => {
            info!("HTTP server shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "HTTP server error");
            Err(Error::Io(e))
        }
    }
}

/// Create the router with all endpoints and middleware
///
/// The request timeout covers the counter routes only; the webhook is bounded
/// by the deploy timeout instead.
pub fn create_router(app_state: Arc<AppState>) -> Result<Router> {
    let config = &app_state.config;
    let max_body = parse_size_string(&config.server.max_request_size)? as usize;

    let mut public_routes = Router::new()
        .route("/tap", get(handle_tap))
        .route("/count", get(handle_count))
        .route("/health", get(handle_health));

    if config.monitoring.metrics_enabled {
        public_routes = public_routes.route(&config.monitoring.metrics_path, get(handle_metrics));
    }

    // Routes added after this layer are not subject to the request timeout
    let routes = public_routes
        .route_layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.server.request_timeout),
        ))
        .route(
            "/github-webhook",
            post(handle_webhook).route_layer(from_fn_with_state(
                app_state.clone(),
                webhook_auth_middleware,
            )),
        );

    Ok(routes
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body))
        .with_state(app_state))
}

/// Parse the listen address from configuration
fn parse_listen_address(listen: &str) -> Result<SocketAddr> {
    listen.parse().map_err(|e| {
        error!(
            listen_addr = %listen,
            error = %e,
            "Invalid listen address format"
        );
        Error::Config(ConfigError::Invalid {
            message: format!("Invalid listen address '{}': {}", listen, e),
        })
    })
}
