//! Sources the webhook secret can be read from

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::SecretError;
use crate::types::Result;

/// One place a secret may live
#[async_trait::async_trait]
pub trait SecretLoader: Send + Sync {
    /// `Ok(None)` when this source does not define `key`
    async fn lookup(&self, key: &str) -> Result<Option<String>>;

    fn name(&self) -> &'static str;
}

/// Process environment, `key` as written or as `<PREFIX>_<KEY>`
pub struct EnvVarSecretLoader {
    prefix: String,
}

impl EnvVarSecretLoader {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Variable names tried for `key`, in order
    pub fn variable_names(&self, key: &str) -> [String; 2] {
        let upper = key.to_uppercase();
        let prefixed = match self.prefix.as_str() {
            "" => upper,
            prefix => format!("{}_{}", prefix, upper),
        };
        [key.to_string(), prefixed]
    }
}

#[async_trait::async_trait]
impl SecretLoader for EnvVarSecretLoader {
    async fn lookup(&self, key: &str) -> Result<Option<String>> {
        for variable in self.variable_names(key) {
            if let Some(raw) = env::var_os(&variable) {
                let value = raw
                    .into_string()
                    .map_err(|_| SecretError::NotUnicode(variable.clone()))?;
                debug!(variable = %variable, "Secret found in environment");
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "env"
    }
}

/// `key=value` file read once at startup
///
/// Blank lines and `#` comments are skipped, values may be wrapped in one pair
/// of single or double quotes.
pub struct FileSecretLoader {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl FileSecretLoader {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| SecretError::Unreadable {
                path: path.display().to_string(),
                source,
            })?;

        let (entries, skipped) = parse_entries(&content);
        for line in skipped {
            // Line contents are never logged, they may hold a secret
            warn!(path = %path.display(), line = line, "Skipping malformed secrets file line");
        }
        debug!(path = %path.display(), entries = entries.len(), "Read secrets file");

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl SecretLoader for FileSecretLoader {
    async fn lookup(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Parsed entries plus the 1-based numbers of lines that were not `key=value`
fn parse_entries(content: &str) -> (HashMap<String, String>, Vec<usize>) {
    let mut entries = HashMap::new();
    let mut skipped = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                entries.insert(key.trim().to_string(), unquote(value.trim()).to_string());
            }
            _ => skipped.push(index + 1),
        }
    }

    (entries, skipped)
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|&quote| {
            value
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
        })
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_env_loader_prefixed_variable() {
        let loader = EnvVarSecretLoader::new("TAPHOOK_LOADER_TEST");
        unsafe {
            env::set_var("TAPHOOK_LOADER_TEST_HOOK_KEY", "from-prefixed");
        }

        assert_eq!(
            loader.lookup("hook_key").await.unwrap().as_deref(),
            Some("from-prefixed")
        );
        assert_eq!(loader.lookup("unset_hook_key").await.unwrap(), None);

        unsafe {
            env::remove_var("TAPHOOK_LOADER_TEST_HOOK_KEY");
        }
    }

    #[tokio::test]
    async fn test_env_loader_direct_name_wins() {
        let loader = EnvVarSecretLoader::new("TAPHOOK_LOADER_ORDER");
        unsafe {
            env::set_var("taphook_loader_direct", "direct");
            env::set_var("TAPHOOK_LOADER_ORDER_TAPHOOK_LOADER_DIRECT", "prefixed");
        }

        assert_eq!(
            loader.lookup("taphook_loader_direct").await.unwrap().as_deref(),
            Some("direct")
        );

        unsafe {
            env::remove_var("taphook_loader_direct");
            env::remove_var("TAPHOOK_LOADER_ORDER_TAPHOOK_LOADER_DIRECT");
        }
    }

    #[test]
    fn test_variable_names() {
        let loader = EnvVarSecretLoader::new("TAPHOOK");
        assert_eq!(
            loader.variable_names("webhook_secret"),
            ["webhook_secret".to_string(), "TAPHOOK_WEBHOOK_SECRET".to_string()]
        );

        let loader = EnvVarSecretLoader::new("");
        assert_eq!(loader.variable_names("webhook_secret")[1], "WEBHOOK_SECRET");
    }

    #[tokio::test]
    async fn test_file_loader() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "# deploy hook\nwebhook_secret=s3cret\n\n  padded = value \nquoted=\"a b\"\nsingle='c=d'\nnot a pair\n=orphan\n"
        )
        .unwrap();
        file.flush().unwrap();

        let loader = FileSecretLoader::open(file.path()).await.unwrap();
        assert_eq!(loader.path(), file.path());
        assert_eq!(loader.lookup("webhook_secret").await.unwrap().as_deref(), Some("s3cret"));
        assert_eq!(loader.lookup("padded").await.unwrap().as_deref(), Some("value"));
        assert_eq!(loader.lookup("quoted").await.unwrap().as_deref(), Some("a b"));
        assert_eq!(loader.lookup("single").await.unwrap().as_deref(), Some("c=d"));
        assert_eq!(loader.lookup("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_loader_missing_file() {
        let result = FileSecretLoader::open("/nonexistent/taphook/secrets").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_entries_reports_skipped_lines() {
        let (entries, skipped) = parse_entries("a=1\nbogus\n# c=3\n=x\nb=2");
        assert_eq!(entries.len(), 2);
        assert_eq!(skipped, vec![2, 4]);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("'abc'"), "abc");
        assert_eq!(unquote("\"abc"), "\"abc");
        assert_eq!(unquote("\""), "\"");
        assert_eq!(unquote("plain"), "plain");
    }
}
