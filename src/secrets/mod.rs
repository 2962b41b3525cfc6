//! Webhook secret loading
//!
//! The signing secret can come from the environment or from a key=value
//! secrets file. A missing or empty secret is not an error at startup: the
//! webhook endpoint refuses every request until one is configured.

pub mod loader;
pub mod manager;
pub mod storage;

pub use loader::{EnvVarSecretLoader, FileSecretLoader, SecretLoader};
pub use manager::SecretManager;
pub use storage::SecureString;

use crate::types::Error;

/// Errors specific to secret loading operations
#[derive(thiserror::Error, Debug)]
pub enum SecretError {
    #[error("Secret source '{0}' is not available")]
    SourceNotAvailable(String),

    #[error("Failed to read secrets file '{path}': {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{0}' is not valid UTF-8")]
    NotUnicode(String),
}

impl From<SecretError> for Error {
    fn from(err: SecretError) -> Self {
        Error::Application(err.to_string())
    }
}

/// Mask secret value for logging purposes
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.is_empty() {
        "[empty]".to_string()
    } else if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("{}***{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "[empty]");
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(mask_secret("verylongsecretkey"), "ve***ey");
        assert_eq!(mask_secret("12345678"), "********");
        assert_eq!(mask_secret("123456789"), "12***89");
    }

    #[test]
    fn test_mask_secret_multibyte() {
        assert_eq!(mask_secret("ééééééééé"), "éé***éé");
    }

    #[test]
    fn test_secret_error_into_application_error() {
        let err: Error = SecretError::SourceNotAvailable("file:/x".to_string()).into();
        assert!(matches!(err, Error::Application(_)));
        assert!(err.to_string().contains("file:/x"));
    }
}
