//! Application state: configuration, credentials and the table manager.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use tabula_core::credential::DynCredentialProvider;
use tabula_core::storage::StorageProvider;
use tabula_infra::config::{load_config, resolve_data_dir};
use tabula_infra::credential::EnvCredentialProvider;
use tabula_infra::manager::TableDataManager;
use tabula_infra::storage::{StorageBackend, create_storage_provider};

/// The manager pinned to the configuration-selected storage backend.
pub type ConcreteManager = TableDataManager<StorageBackend>;

pub struct AppState {
    pub manager: ConcreteManager,
}

impl AppState {
    /// Load configuration from the data directory and open the database.
    pub async fn init(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(resolve_data_dir);
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;
        tracing::debug!(
            data_dir = %data_dir.display(),
            embedder = %config.database.embedder_provider,
            "Configuration loaded"
        );

        let mut env = EnvCredentialProvider::new();
        if let Some(var) = &config.embedder.api_key_env {
            env = env.with_api_key_var(var);
        }
        let credentials: Vec<DynCredentialProvider> = vec![Arc::new(env)];

        let storage =
            create_storage_provider(&config.database.storage, &data_dir, credentials.clone());
        let description = storage.describe();
        let manager = TableDataManager::new(storage, config, credentials)
            .await
            .with_context(|| format!("Failed to open database at {description}"))?;

        Ok(Self { manager })
    }
}
