//! Credential provider port.
//!
//! Cloud-backed storage and embedding paths need a key or bearer token.
//! Instead of acquiring credentials globally at startup, a provider is
//! injected into the table manager and consulted only when a path that
//! needs one is actually used.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tabula_types::error::TableError;

/// What a credential will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialScope {
    /// Object storage holding the database.
    Storage,
    /// The embedding service.
    Embedding,
}

impl CredentialScope {
    /// OAuth scope requested from an Azure token issuer.
    pub fn azure_scope(&self) -> &'static str {
        match self {
            CredentialScope::Storage => "https://storage.azure.com/.default",
            CredentialScope::Embedding => "https://cognitiveservices.azure.com/.default",
        }
    }
}

/// Trait for credential sources (environment, static values, token issuers).
///
/// Uses RPITIT. Implementations live in tabula-infra.
pub trait CredentialProvider: Send + Sync {
    /// Resolve an API key for the scope. `Ok(None)` means this provider has none.
    fn api_key(
        &self,
        scope: CredentialScope,
    ) -> impl Future<Output = Result<Option<String>, TableError>> + Send;

    /// Resolve a bearer token for the scope. `Ok(None)` means this provider has none.
    fn bearer_token(
        &self,
        scope: CredentialScope,
    ) -> impl Future<Output = Result<Option<String>, TableError>> + Send;
}

/// Object-safe version of [`CredentialProvider`] with boxed futures.
pub trait CredentialProviderDyn: Send + Sync {
    fn api_key_boxed(
        &self,
        scope: CredentialScope,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, TableError>> + Send + '_>>;

    fn bearer_token_boxed(
        &self,
        scope: CredentialScope,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, TableError>> + Send + '_>>;
}

impl<T: CredentialProvider> CredentialProviderDyn for T {
    fn api_key_boxed(
        &self,
        scope: CredentialScope,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, TableError>> + Send + '_>> {
        Box::pin(self.api_key(scope))
    }

    fn bearer_token_boxed(
        &self,
        scope: CredentialScope,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, TableError>> + Send + '_>> {
        Box::pin(self.bearer_token(scope))
    }
}

/// Shared, type-erased credential provider.
pub type DynCredentialProvider = Arc<dyn CredentialProviderDyn>;

/// Resolve an API key from the first provider in `chain` that has one.
pub async fn resolve_api_key(
    chain: &[DynCredentialProvider],
    scope: CredentialScope,
) -> Result<Option<String>, TableError> {
    for provider in chain {
        if let Some(key) = provider.api_key_boxed(scope).await? {
            return Ok(Some(key));
        }
    }
    Ok(None)
}

/// Resolve a bearer token from the first provider in `chain` that has one.
pub async fn resolve_bearer_token(
    chain: &[DynCredentialProvider],
    scope: CredentialScope,
) -> Result<Option<String>, TableError> {
    for provider in chain {
        if let Some(token) = provider.bearer_token_boxed(scope).await? {
            return Ok(Some(token));
        }
    }
    Ok(None)
}
