//! HTTP endpoint handlers

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::{sync::Arc, time::SystemTime};
use tracing::{info, warn, Instrument};

use crate::{
    config::SystemConfig,
    deployment::DeploymentManager,
    http::{middleware::auth::header_value, responses::*},
    logging, metrics,
    secrets::SecureString,
    state::CounterStore,
    types::{Error, StorageError},
    webhook::{classify, WebhookAction, DELIVERY_HEADER, EVENT_HEADER},
};

/// Application state shared across handlers
pub struct AppState {
    pub config: SystemConfig,
    pub counter: Arc<CounterStore>,
    pub deployer: Arc<DeploymentManager>,
    /// `None` keeps the webhook closed
    pub webhook_secret: Option<Arc<SecureString>>,
    pub start_time: SystemTime,
}

/// GET /tap - count a visit and send the browser back to /
pub async fn handle_tap(State(state): State<Arc<AppState>>) -> Response {
    let counter = state.counter.clone();
    let result = tokio::task::spawn_blocking(move || counter.increment())
        .await
        .map_err(|e| Error::from(StorageError::TaskFailed(e.to_string())))
        .and_then(|r| r);

    match result {
        Ok(count) => {
            metrics::record_tap();
            info!(count = count, "Tap recorded");
            (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Tap failed");
            e.into_response()
        }
    }
}

/// GET /count
pub async fn handle_count(State(state): State<Arc<AppState>>) -> Json<CountResponse> {
    Json(CountResponse {
        count: state.counter.read(),
    })
}

/// POST /github-webhook - reached only with a verified signature
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let event = header_value(&headers, EVENT_HEADER);
    let delivery_id = header_value(&headers, DELIVERY_HEADER).unwrap_or_else(|| "unknown".to_string());
    let event_label = event.clone().unwrap_or_else(|| "unknown".to_string());

    let span = logging::webhook_delivery_span(&delivery_id, &event_label);

    async move {
        let action = match classify(
            event.as_deref(),
            &body,
            &state.config.deploy.production_ref,
        ) {
            Ok(action) => action,
            Err(e) => {
                warn!(error = %e, "Rejecting malformed webhook payload");
                metrics::record_webhook_event(&event_label, "invalid");
                return e.into_response();
            }
        };

        match action {
            WebhookAction::Ping => {
                info!("Received ping");
                metrics::record_webhook_event(&event_label, "pong");
                (
                    StatusCode::OK,
                    Json(PingResponse {
                        ok: true,
                        message: "pong".to_string(),
                    }),
                )
                    .into_response()
            }
            WebhookAction::Ignored { reason } => {
                info!(reason = %reason, "Ignoring webhook delivery");
                metrics::record_webhook_event(&event_label, "ignored");
                (StatusCode::ACCEPTED, Json(IgnoredResponse::new(reason))).into_response()
            }
            WebhookAction::Deploy {
                git_ref,
                after,
                repository,
            } => {
                info!(
                    git_ref = %git_ref,
                    after = after.as_deref().unwrap_or("unknown"),
                    repository = repository.as_deref().unwrap_or("unknown"),
                    "Push to production ref, deploying"
                );

                let result = state
                    .deployer
                    .run_deploy()
                    .instrument(logging::deploy_span(&git_ref, after.as_deref()))
                    .await;

                match result {
                    Ok(result) => {
                        metrics::record_webhook_event(&event_label, "deployed");
                        (StatusCode::OK, Json(DeployResponse::from(result))).into_response()
                    }
                    Err(e) => {
                        metrics::record_webhook_event(&event_label, "deploy_failed");
                        e.into_response()
                    }
                }
            }
        }
    }
    .instrument(span)
    .await
}

/// GET /health
pub async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let uptime_seconds = SystemTime::now()
        .duration_since(state.start_time)
        .unwrap_or_default()
        .as_secs();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        count: state.counter.read(),
        deploy_in_progress: state.deployer.is_deploying(),
        webhook_configured: state.webhook_secret.is_some(),
    })
}

/// GET /metrics - Prometheus text format
pub async fn handle_metrics() -> Result<impl IntoResponse, StatusCode> {
    match metrics::gather_metrics() {
        Ok(metrics_text) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            metrics_text,
        )),
        Err(e) => {
            warn!(error = %e, "Failed to gather Prometheus metrics");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Fallback for unknown routes
pub async fn handle_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::with_message("Endpoint not found", "NOT_FOUND")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::testing::{FakeInvoker, FakeOutcome};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_state(secret: Option<&str>) -> (Arc<AppState>, TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let counter = CounterStore::open(temp_dir.path().join("tap_count.json")).unwrap();
        let deployer = DeploymentManager::new(
            Arc::new(FakeInvoker::new(FakeOutcome::Succeed)),
            Duration::from_secs(5),
        );

        let state = Arc::new(AppState {
            config: SystemConfig::default(),
            counter: Arc::new(counter),
            deployer: Arc::new(deployer),
            webhook_secret: secret.map(|s| Arc::new(SecureString::new(s.to_string()))),
            start_time: SystemTime::now(),
        });
        (state, temp_dir)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_handle_tap_redirects_and_counts() {
        let (state, _temp_dir) = create_test_state(None);

        let response = handle_tap(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/");
        assert_eq!(state.counter.read(), 1);
    }

    #[tokio::test]
    async fn test_handle_tap_storage_failure() {
        let (state, temp_dir) = create_test_state(None);
        std::fs::remove_dir_all(temp_dir.path()).unwrap();

        let response = handle_tap(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["code"], "STORAGE_ERROR");
        assert_eq!(state.counter.read(), 0);
    }

    #[tokio::test]
    async fn test_handle_count() {
        let (state, _temp_dir) = create_test_state(None);
        state.counter.increment().unwrap();
        state.counter.increment().unwrap();

        let Json(response) = handle_count(State(state)).await;
        assert_eq!(response.count, 2);
    }

    #[tokio::test]
    async fn test_handle_health() {
        let (state, _temp_dir) = create_test_state(Some("secret"));

        let Json(health) = handle_health(State(state)).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.count, 0);
        assert!(!health.deploy_in_progress);
        assert!(health.webhook_configured);
    }

    #[tokio::test]
    async fn test_handle_webhook_ping() {
        let (state, _temp_dir) = create_test_state(Some("secret"));
        let mut headers = HeaderMap::new();
        headers.insert(EVENT_HEADER, "ping".parse().unwrap());

        let response = handle_webhook(State(state), headers, Bytes::from_static(b"{}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "pong");
    }

    #[tokio::test]
    async fn test_handle_not_found() {
        let response = handle_not_found().await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "NOT_FOUND");
    }
}
