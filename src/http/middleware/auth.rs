//! Webhook signature middleware
//!
//! Buffers the raw body, checks `X-Hub-Signature-256` against the configured
//! secret and only then hands the request to the webhook handler. Without a
//! configured secret every request is refused with 503.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use http_body_util::LengthLimitError;
use std::sync::Arc;
use tracing::warn;

use crate::{
    http::{handlers::AppState, responses::ErrorResponse},
    metrics,
    types::Error,
    webhook::{verify_signature, DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER},
};

/// Axum middleware guarding the webhook route
pub async fn webhook_auth_middleware(
    State(app_state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let event = header_value(request.headers(), EVENT_HEADER).unwrap_or_else(|| "unknown".to_string());

    let Some(secret) = app_state.webhook_secret.clone() else {
        warn!(event = %event, "Webhook request refused, secret is not configured");
        metrics::record_webhook_event(&event, "not_configured");
        return Error::NotConfigured.into_response();
    };

    let signature = header_value(request.headers(), SIGNATURE_HEADER);
    let delivery = header_value(request.headers(), DELIVERY_HEADER);

    let (parts, body) = request.into_parts();
    let body_bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) if exceeded_body_limit(&e) => {
            warn!(event = %event, "Webhook body exceeds the request size limit");
            metrics::record_webhook_event(&event, "too_large");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(ErrorResponse::with_message(
                    "request body exceeds the configured size limit",
                    "PAYLOAD_TOO_LARGE",
                )),
            )
                .into_response();
        }
        Err(e) => {
            warn!(error = %e, "Failed to read webhook body");
            return Error::Validation {
                field: "body".to_string(),
                message: "request body could not be read".to_string(),
            }
            .into_response();
        }
    };

    if !verify_signature(&body_bytes, signature.as_deref(), secret.as_bytes()) {
        warn!(
            event = %event,
            delivery_id = delivery.as_deref().unwrap_or("unknown"),
            signature_present = signature.is_some(),
            "Webhook signature verification failed"
        );
        metrics::record_webhook_event(&event, "rejected");
        return Error::Authentication("invalid or missing signature".to_string()).into_response();
    }

    let request = Request::from_parts(parts, Body::from(body_bytes));
    next.run(request).await
}

/// Whether a body read failed because the outer size limit cut it off
fn exceeded_body_limit(error: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = err.source();
    }
    false
}

/// Extract a header as an owned string, ignoring non-UTF-8 values
pub(crate) fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string())
}
