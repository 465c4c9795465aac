//! Configuration types for Tabula.
//!
//! `TabulaConfig` represents the top-level `config.toml`: which storage
//! backend the database lives on and which embedding provider backs vector
//! search. All fields have defaults so an empty file is valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabulaConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Settings for remote embedding providers.
    #[serde(default)]
    pub embedder: EmbedderConfig,
}

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Registry name of the embedding provider (`fastembed`, `openai`, `azure-openai`).
    #[serde(default = "default_embedder_provider")]
    pub embedder_provider: String,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_embedder_provider() -> String {
    "fastembed".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            embedder_provider: default_embedder_provider(),
            storage: StorageConfig::default(),
        }
    }
}

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
    /// A directory on the local filesystem. `None` means `{data_dir}/lancedb`.
    Local {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    /// An Azure Blob Storage container.
    Azure {
        account_name: String,
        container: String,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        tenant_id: Option<String>,
    },
    /// Any URI the engine understands, passed through unchanged.
    Uri { uri: String },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Local { path: None }
    }
}

/// Settings for the remote (OpenAI-compatible) embedding providers.
///
/// Ignored by the local `fastembed` provider except for `cache_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    /// Model identifier sent with each request.
    #[serde(default)]
    pub model: Option<String>,

    /// Base URL (OpenAI) or resource endpoint (Azure).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Azure deployment name.
    #[serde(default)]
    pub deployment: Option<String>,

    /// Azure REST API version.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Requested output dimensionality, when the model supports it.
    #[serde(default)]
    pub dimensions: Option<usize>,

    /// HTTP timeout for embedding requests.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Model cache directory for the local provider.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

fn default_api_version() -> String {
    "2024-02-01".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            model: None,
            base_url: None,
            api_key_env: None,
            deployment: None,
            api_version: default_api_version(),
            dimensions: None,
            timeout_secs: default_timeout_secs(),
            cache_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = TabulaConfig::default();
        assert_eq!(config.database.embedder_provider, "fastembed");
        assert_eq!(config.database.storage, StorageConfig::Local { path: None });
        assert_eq!(config.embedder.timeout_secs, 60);
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: TabulaConfig = toml::from_str("").unwrap();
        assert_eq!(config.database.embedder_provider, "fastembed");
        assert_eq!(config.embedder.api_version, "2024-02-01");
    }

    #[test]
    fn test_config_deserialize_azure_storage() {
        let toml_str = r#"
[database]
embedder_provider = "azure-openai"

[database.storage]
kind = "azure"
account_name = "acct"
container = "vectors"
prefix = "prod"

[embedder]
base_url = "https://example.openai.azure.com"
deployment = "embed-small"
"#;
        let config: TabulaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.database.embedder_provider, "azure-openai");
        match config.database.storage {
            StorageConfig::Azure {
                account_name,
                container,
                prefix,
                tenant_id,
            } => {
                assert_eq!(account_name, "acct");
                assert_eq!(container, "vectors");
                assert_eq!(prefix.as_deref(), Some("prod"));
                assert!(tenant_id.is_none());
            }
            other => panic!("expected azure storage, got {other:?}"),
        }
        assert_eq!(config.embedder.deployment.as_deref(), Some("embed-small"));
    }

    #[test]
    fn test_config_deserialize_uri_storage() {
        let toml_str = r#"
[database.storage]
kind = "uri"
uri = "memory://scratch"
"#;
        let config: TabulaConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.database.storage,
            StorageConfig::Uri {
                uri: "memory://scratch".to_string()
            }
        );
    }
}
