//! Storage providers: where the database lives.
//!
//! Each provider turns configuration into a [`StorageLocation`]. Cloud
//! providers consult the injected credential chain on every resolve, so a
//! reconnect picks up refreshed tokens.

use std::path::{Path, PathBuf};

use tabula_core::credential::{
    CredentialScope, DynCredentialProvider, resolve_api_key, resolve_bearer_token,
};
use tabula_core::storage::{StorageLocation, StorageProvider};
use tabula_types::config::StorageConfig;
use tabula_types::error::TableError;

/// A directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: expand_home(path.into()),
        }
    }
}

fn expand_home(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or(path),
        Err(_) => path,
    }
}

impl StorageProvider for LocalStorage {
    async fn resolve(&self) -> Result<StorageLocation, TableError> {
        tokio::fs::create_dir_all(&self.path).await.map_err(|e| {
            TableError::Config(format!("cannot create {}: {e}", self.path.display()))
        })?;
        let uri = self.path.to_str().ok_or_else(|| {
            TableError::Config(format!(
                "path contains invalid UTF-8: {}",
                self.path.display()
            ))
        })?;
        Ok(StorageLocation::new(uri))
    }

    fn describe(&self) -> String {
        format!("local:{}", self.path.display())
    }
}

/// An Azure Blob Storage container, addressed as `az://{container}/{prefix}`.
pub struct AzureBlobStorage {
    account_name: String,
    container: String,
    prefix: Option<String>,
    tenant_id: Option<String>,
    credentials: Vec<DynCredentialProvider>,
}

impl AzureBlobStorage {
    pub fn new(
        account_name: impl Into<String>,
        container: impl Into<String>,
        credentials: Vec<DynCredentialProvider>,
    ) -> Self {
        Self {
            account_name: account_name.into(),
            container: container.into(),
            prefix: None,
            tenant_id: None,
            credentials,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    fn uri(&self) -> String {
        match self.prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("az://{}/{prefix}", self.container),
            _ => format!("az://{}", self.container),
        }
    }
}

impl StorageProvider for AzureBlobStorage {
    async fn resolve(&self) -> Result<StorageLocation, TableError> {
        let mut location = StorageLocation::new(self.uri())
            .with_option("azure_storage_account_name", &self.account_name);
        if let Some(tenant) = &self.tenant_id {
            location = location.with_option("azure_tenant_id", tenant);
        }

        if let Some(key) = resolve_api_key(&self.credentials, CredentialScope::Storage).await? {
            location = location.with_option("azure_storage_account_key", key);
        } else if let Some(token) =
            resolve_bearer_token(&self.credentials, CredentialScope::Storage).await?
        {
            location = location.with_option("azure_storage_token", token);
        } else {
            tracing::warn!(
                account = %self.account_name,
                "No storage key or token available, relying on ambient Azure credentials"
            );
        }
        Ok(location)
    }

    fn describe(&self) -> String {
        format!("azure:{}@{}", self.uri(), self.account_name)
    }
}

/// Any URI the engine understands, passed through unchanged.
#[derive(Debug, Clone)]
pub struct UriStorage {
    uri: String,
}

impl UriStorage {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

impl StorageProvider for UriStorage {
    async fn resolve(&self) -> Result<StorageLocation, TableError> {
        Ok(StorageLocation::new(&self.uri))
    }

    fn describe(&self) -> String {
        self.uri.clone()
    }
}

/// The storage provider selected by configuration.
pub enum StorageBackend {
    Local(LocalStorage),
    Azure(AzureBlobStorage),
    Uri(UriStorage),
}

impl StorageProvider for StorageBackend {
    async fn resolve(&self) -> Result<StorageLocation, TableError> {
        match self {
            StorageBackend::Local(s) => s.resolve().await,
            StorageBackend::Azure(s) => s.resolve().await,
            StorageBackend::Uri(s) => s.resolve().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            StorageBackend::Local(s) => s.describe(),
            StorageBackend::Azure(s) => s.describe(),
            StorageBackend::Uri(s) => s.describe(),
        }
    }
}

/// Build the storage provider for `config`.
///
/// A local store without an explicit path lives at `{data_dir}/lancedb`.
pub fn create_storage_provider(
    config: &StorageConfig,
    data_dir: &Path,
    credentials: Vec<DynCredentialProvider>,
) -> StorageBackend {
    match config {
        StorageConfig::Local { path } => StorageBackend::Local(LocalStorage::new(
            path.clone().unwrap_or_else(|| data_dir.join("lancedb")),
        )),
        StorageConfig::Azure {
            account_name,
            container,
            prefix,
            tenant_id,
        } => {
            let mut storage = AzureBlobStorage::new(account_name, container, credentials);
            if let Some(prefix) = prefix {
                storage = storage.with_prefix(prefix);
            }
            if let Some(tenant) = tenant_id {
                storage = storage.with_tenant_id(tenant);
            }
            StorageBackend::Azure(storage)
        }
        StorageConfig::Uri { uri } => StorageBackend::Uri(UriStorage::new(uri)),
    }
}
