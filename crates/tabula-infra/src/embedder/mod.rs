//! Embedding providers and the registry that builds them by name.
//!
//! | name                  | implementation                         |
//! |-----------------------|----------------------------------------|
//! | `fastembed`, `local`  | [`FastEmbedder`] (BGE-small, 384 dims) |
//! | `openai`              | [`OpenAiEmbedder`] against OpenAI      |
//! | `azure-openai`        | [`OpenAiEmbedder`] against Azure       |

pub mod fastembed;
pub mod openai;

use std::time::Duration;

use secrecy::SecretString;

use tabula_core::credential::{
    CredentialScope, DynCredentialProvider, resolve_api_key, resolve_bearer_token,
};
use tabula_core::embedding::BoxEmbedder;
use tabula_types::config::EmbedderConfig;
use tabula_types::error::TableError;

pub use self::fastembed::FastEmbedder;
pub use self::openai::{EmbeddingAuth, OpenAiEmbedder};

/// Provider names accepted by [`build_embedder`].
pub const PROVIDER_NAMES: &[&str] = &["fastembed", "local", "openai", "azure-openai"];

/// Build the embedder registered under `provider`.
pub async fn build_embedder(
    provider: &str,
    config: &EmbedderConfig,
    credentials: &[DynCredentialProvider],
) -> Result<BoxEmbedder, TableError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match provider {
        "fastembed" | "local" => Ok(BoxEmbedder::new(
            FastEmbedder::new(config.cache_dir.clone()).await?,
        )),
        "openai" => {
            let api_key = api_key(credentials).await?.ok_or_else(|| {
                TableError::Config("no API key found for the openai embedder".to_string())
            })?;
            let embedder = OpenAiEmbedder::openai(
                config
                    .base_url
                    .as_deref()
                    .unwrap_or(openai::DEFAULT_OPENAI_BASE_URL),
                config
                    .model
                    .as_deref()
                    .unwrap_or(openai::DEFAULT_OPENAI_MODEL),
                api_key,
                config.dimensions,
                timeout,
            )?;
            Ok(BoxEmbedder::new(embedder))
        }
        "azure-openai" => {
            let endpoint = config.base_url.as_deref().ok_or_else(|| {
                TableError::Config("azure-openai embedder needs embedder.base_url".to_string())
            })?;
            let deployment = config.deployment.as_deref().ok_or_else(|| {
                TableError::Config("azure-openai embedder needs embedder.deployment".to_string())
            })?;
            let auth = match api_key(credentials).await? {
                Some(key) => EmbeddingAuth::ApiKeyHeader(key),
                None => resolve_bearer_token(credentials, CredentialScope::Embedding)
                    .await?
                    .map(|t| EmbeddingAuth::Bearer(SecretString::from(t)))
                    .ok_or_else(|| {
                        TableError::Config(
                            "no API key or token found for the azure-openai embedder".to_string(),
                        )
                    })?,
            };
            let embedder = OpenAiEmbedder::azure(
                endpoint,
                deployment,
                &config.api_version,
                config
                    .model
                    .as_deref()
                    .unwrap_or(openai::DEFAULT_OPENAI_MODEL),
                auth,
                config.dimensions,
                timeout,
            )?;
            Ok(BoxEmbedder::new(embedder))
        }
        other => Err(TableError::Config(format!(
            "unknown embedder provider '{other}' (expected one of: {})",
            PROVIDER_NAMES.join(", ")
        ))),
    }
}

async fn api_key(
    credentials: &[DynCredentialProvider],
) -> Result<Option<SecretString>, TableError> {
    Ok(resolve_api_key(credentials, CredentialScope::Embedding)
        .await?
        .map(SecretString::from))
}
