//! Storage provider port.
//!
//! A storage provider turns configuration into the URI and engine storage
//! options the database connection is opened with.

use tabula_types::error::TableError;

/// A resolved database location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageLocation {
    /// Opaque URI handed to the engine (`/path`, `az://container/prefix`, ...).
    pub uri: String,
    /// Engine storage options (`azure_storage_account_name`, ...).
    pub options: Vec<(String, String)>,
}

impl StorageLocation {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    /// Look up a storage option by key.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Trait for resolving where the database lives.
///
/// Called on every (re)connect, so implementations may refresh short-lived
/// credentials here.
pub trait StorageProvider: Send + Sync {
    fn resolve(&self) -> impl std::future::Future<Output = Result<StorageLocation, TableError>> + Send;

    /// Human-readable description for logs (never includes secrets).
    fn describe(&self) -> String;
}
