//! Secret manager that walks the configured loaders in priority order

use tracing::{debug, info, trace, warn};

use super::{mask_secret, EnvVarSecretLoader, FileSecretLoader, SecretError, SecretLoader, SecureString};
use crate::config::SecretsConfig;
use crate::types::Result;

/// Resolves secrets from the sources selected by `secrets.source`
pub struct SecretManager {
    config: SecretsConfig,
    loaders: Vec<Box<dyn SecretLoader>>,
}

impl SecretManager {
    /// Create a new SecretManager from configuration
    pub async fn new(config: SecretsConfig) -> Result<Self> {
        let loaders = Self::create_loaders(&config).await?;

        info!(
            loaders = ?loaders.iter().map(|l| l.name()).collect::<Vec<_>>(),
            "SecretManager initialized"
        );

        Ok(Self { config, loaders })
    }

    /// Create loaders based on configuration
    async fn create_loaders(config: &SecretsConfig) -> Result<Vec<Box<dyn SecretLoader>>> {
        let mut loaders: Vec<Box<dyn SecretLoader>> = Vec::new();

        let want_env = matches!(config.source.as_str(), "auto" | "env");
        let want_file = matches!(config.source.as_str(), "auto" | "file");

        if want_env {
            loaders.push(Box::new(EnvVarSecretLoader::new(
                config.secret_prefix.clone(),
            )));
        }

        if want_file {
            let file_exists = match &config.secrets_file {
                Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
                None => false,
            };

            match &config.secrets_file {
                Some(path) if file_exists => {
                    loaders.push(Box::new(FileSecretLoader::open(path).await?));
                    debug!("Added secret loader: file");
                }
                Some(path) if config.source == "file" => {
                    return Err(SecretError::SourceNotAvailable(format!("file:{}", path)).into());
                }
                Some(path) => {
                    debug!("Secrets file '{}' is not available, skipping", path);
                }
                None if config.source == "file" => {
                    return Err(
                        SecretError::SourceNotAvailable("file: no secrets_file set".to_string())
                            .into(),
                    );
                }
                None => {}
            }
        }

        if loaders.is_empty() {
            return Err(SecretError::SourceNotAvailable(config.source.clone()).into());
        }

        Ok(loaders)
    }

    /// Load a secret by key from the first loader that has it
    ///
    /// An empty value counts as absent.
    pub async fn load_secret(&self, key: &str) -> Result<Option<SecureString>> {
        for loader in &self.loaders {
            match loader.lookup(key).await {
                Ok(Some(value)) if !value.is_empty() => {
                    debug!(
                        "Loaded secret '{}' from {} loader ({})",
                        key,
                        loader.name(),
                        mask_secret(&value)
                    );
                    return Ok(Some(SecureString::new(value)));
                }
                Ok(Some(_)) => {
                    warn!("Secret '{}' from {} loader is empty, ignoring", key, loader.name());
                }
                Ok(None) => {
                    trace!("Secret '{}' not found in {} loader", key, loader.name());
                }
                Err(e) => {
                    warn!(
                        "Error loading secret '{}' from {} loader: {}",
                        key,
                        loader.name(),
                        e
                    );
                }
            }
        }

        Ok(None)
    }

    /// Load the webhook signing secret named by `secrets.secret_name`
    pub async fn load_webhook_secret(&self) -> Result<Option<SecureString>> {
        let secret = self.load_secret(&self.config.secret_name).await?;
        if secret.is_none() {
            warn!(
                "Webhook secret '{}' is not configured; webhook requests will be refused",
                self.config.secret_name
            );
        }
        Ok(secret)
    }

    /// Names of the active loaders in priority order
    pub fn get_loader_names(&self) -> Vec<&'static str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }
}
