//! Deciding what a verified webhook delivery asks for

use serde::Deserialize;
use tracing::debug;

use crate::types::{Error, Result};

/// Header naming the event type (`push`, `ping`, ...)
pub const EVENT_HEADER: &str = "x-github-event";

/// Unique delivery id, only used for logging
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// Fields of a push payload that are logged; nothing here reaches the deploy command
#[derive(Debug, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub after: Option<String>,
    pub repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAction {
    /// GitHub's hook-created ping
    Ping,
    /// Push to the production ref
    Deploy {
        git_ref: String,
        after: Option<String>,
        repository: Option<String>,
    },
    /// Acknowledged but not acted on
    Ignored { reason: String },
}

/// Classify a delivery whose signature has already been verified
///
/// Only `push` bodies are parsed; a push body that is not valid JSON is a
/// validation error.
pub fn classify(event: Option<&str>, body: &[u8], production_ref: &str) -> Result<WebhookAction> {
    let event = match event {
        Some(event) => event,
        None => {
            return Ok(WebhookAction::Ignored {
                reason: "missing X-GitHub-Event header".to_string(),
            })
        }
    };

    match event {
        "ping" => Ok(WebhookAction::Ping),
        "push" => {
            let payload: PushPayload =
                serde_json::from_slice(body).map_err(|e| Error::Validation {
                    field: "body".to_string(),
                    message: format!("invalid push payload: {}", e),
                })?;

            let Some(git_ref) = payload.git_ref else {
                return Ok(WebhookAction::Ignored {
                    reason: "push without ref".to_string(),
                });
            };

            if git_ref != production_ref {
                debug!(git_ref = %git_ref, production_ref = %production_ref, "Ignoring push");
                return Ok(WebhookAction::Ignored {
                    reason: format!("ref {} is not {}", git_ref, production_ref),
                });
            }

            Ok(WebhookAction::Deploy {
                git_ref,
                after: payload.after,
                repository: payload.repository.and_then(|r| r.full_name),
            })
        }
        other => Ok(WebhookAction::Ignored {
            reason: format!("event '{}' is not handled", other),
        }),
    }
}
