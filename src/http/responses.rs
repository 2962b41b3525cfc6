//! JSON response bodies and the mapping from errors to HTTP statuses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::types::{DeployResult, Error, ExecutionError};

/// GET /count
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Successful deploy
#[derive(Debug, Serialize)]
pub struct DeployResponse {
    pub ok: bool,
    pub exit_code: Option<i32>,
    pub stdout_tail: String,
    pub stderr_tail: String,
    pub duration_ms: u64,
}

impl From<DeployResult> for DeployResponse {
    fn from(result: DeployResult) -> Self {
        Self {
            ok: true,
            exit_code: result.exit_code,
            stdout_tail: result.stdout_tail,
            stderr_tail: result.stderr_tail,
            duration_ms: result.duration_ms,
        }
    }
}

/// Delivery acknowledged without deploying (202)
#[derive(Debug, Serialize)]
pub struct IgnoredResponse {
    pub ok: bool,
    pub ignored: bool,
    pub reason: String,
}

impl IgnoredResponse {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            ok: true,
            ignored: true,
            reason: reason.into(),
        }
    }
}

/// Reply to GitHub's ping event
#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub ok: bool,
    pub message: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub count: u64,
    pub deploy_in_progress: bool,
    pub webhook_configured: bool,
}

/// Standard error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_tail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<String>,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: &Error) -> Self {
        let mut response = Self::with_message(error.to_string(), error_to_code(error));

        if let Error::Execution(ExecutionError::NonZeroExit {
            code,
            stdout_tail,
            stderr_tail,
            ..
        }) = error
        {
            response.exit_code = *code;
            response.stdout_tail = Some(stdout_tail.clone());
            response.stderr_tail = Some(stderr_tail.clone());
        }

        response
    }

    pub fn with_message(error: impl Into<String>, code: &str) -> Self {
        Self {
            ok: false,
            error: error.into(),
            code: code.to_string(),
            exit_code: None,
            stdout_tail: None,
            stderr_tail: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Machine readable error code
fn error_to_code(error: &Error) -> &'static str {
    match error {
        Error::Config(_) => "CONFIG_ERROR",
        Error::Storage(_) => "STORAGE_ERROR",
        Error::Execution(ExecutionError::Timeout { .. }) => "DEPLOY_TIMEOUT",
        Error::Execution(_) => "DEPLOY_FAILED",
        Error::NotConfigured => "NOT_CONFIGURED",
        Error::Authentication(_) => "AUTH_ERROR",
        Error::Validation { .. } => "VALIDATION_ERROR",
        Error::Io(_) => "IO_ERROR",
        Error::Application(_) => "APPLICATION_ERROR",
    }
}

/// Convert error types to HTTP status codes
pub fn error_to_status_code(error: &Error) -> StatusCode {
    match error {
        Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Execution(ExecutionError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        Error::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        Error::Authentication(_) => StatusCode::FORBIDDEN,
        Error::Validation { .. } => StatusCode::BAD_REQUEST,
        Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Application(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = error_to_status_code(&self);
        let error_response = ErrorResponse::new(&self);
        (status_code, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StorageError;

    #[test]
    fn test_error_to_status_code() {
        assert_eq!(
            error_to_status_code(&Error::NotConfigured),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            error_to_status_code(&Error::Authentication("bad signature".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            error_to_status_code(&Error::Validation {
                field: "body".to_string(),
                message: "not json".to_string()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_to_status_code(
                &ExecutionError::Timeout {
                    command: "deploy.sh".to_string(),
                    timeout: 120
                }
                .into()
            ),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            error_to_status_code(
                &ExecutionError::StartFailed {
                    command: "deploy.sh".to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }
                .into()
            ),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            error_to_status_code(&StorageError::Overflow { value: u64::MAX }.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_non_zero_exit_carries_diagnostics() {
        let error: Error = ExecutionError::NonZeroExit {
            command: "deploy.sh".to_string(),
            code: Some(2),
            stdout_tail: "step 1\n".to_string(),
            stderr_tail: "boom\n".to_string(),
        }
        .into();

        let response = ErrorResponse::new(&error);
        assert!(!response.ok);
        assert_eq!(response.code, "DEPLOY_FAILED");
        assert_eq!(response.exit_code, Some(2));
        assert_eq!(response.stderr_tail.as_deref(), Some("boom\n"));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["stdout_tail"], "step 1\n");
    }

    #[test]
    fn test_plain_error_omits_diagnostics() {
        let response = ErrorResponse::new(&Error::NotConfigured);
        assert_eq!(response.code, "NOT_CONFIGURED");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], false);
        assert!(json.get("stderr_tail").is_none());
        assert!(json.get("exit_code").is_none());
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn test_deploy_response_from_result() {
        let response = DeployResponse::from(DeployResult {
            exit_code: Some(0),
            stdout_tail: "done\n".to_string(),
            stderr_tail: String::new(),
            duration_ms: 1200,
        });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["stdout_tail"], "done\n");
        assert_eq!(json["duration_ms"], 1200);
    }

    #[test]
    fn test_ignored_response() {
        let json = serde_json::to_value(IgnoredResponse::new("ref refs/heads/dev is not refs/heads/main")).unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["ignored"], true);
        assert!(json["reason"].as_str().unwrap().contains("refs/heads/dev"));
    }
}
