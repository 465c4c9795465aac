//! Credential providers.
//!
//! `EnvCredentialProvider` reads keys and tokens from environment variables,
//! checked in order per scope. `StaticCredentialProvider` holds fixed values
//! and is used by tests and by callers embedding the manager with their own
//! credential source.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};

use tabula_core::credential::{CredentialProvider, CredentialScope};
use tabula_types::error::TableError;

const EMBEDDING_KEY_VARS: &[&str] = &["AZURE_OPENAI_API_KEY", "OPENAI_API_KEY"];
const EMBEDDING_TOKEN_VARS: &[&str] = &["AZURE_OPENAI_AD_TOKEN", "AZURE_ACCESS_TOKEN"];
const STORAGE_KEY_VARS: &[&str] = &["AZURE_STORAGE_ACCOUNT_KEY"];
const STORAGE_TOKEN_VARS: &[&str] = &["AZURE_STORAGE_TOKEN", "AZURE_ACCESS_TOKEN"];

/// Environment variable credential provider.
///
/// Variables that are set but not valid Unicode are treated as absent.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialProvider {
    /// Extra variables checked before the defaults for embedding API keys.
    embedding_key_vars: Vec<String>,
}

impl EnvCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `var` first when resolving the embedding API key.
    pub fn with_api_key_var(mut self, var: impl Into<String>) -> Self {
        self.embedding_key_vars.insert(0, var.into());
        self
    }

    fn key_vars(&self, scope: CredentialScope) -> Vec<&str> {
        match scope {
            CredentialScope::Embedding => self
                .embedding_key_vars
                .iter()
                .map(String::as_str)
                .chain(EMBEDDING_KEY_VARS.iter().copied())
                .collect(),
            CredentialScope::Storage => STORAGE_KEY_VARS.to_vec(),
        }
    }
}

fn first_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match std::env::var(name) {
        Ok(val) if !val.is_empty() => Some(val),
        Ok(_) => None,
        Err(std::env::VarError::NotPresent) => None,
        Err(std::env::VarError::NotUnicode(_)) => None,
    })
}

impl CredentialProvider for EnvCredentialProvider {
    async fn api_key(&self, scope: CredentialScope) -> Result<Option<String>, TableError> {
        Ok(first_var(&self.key_vars(scope)))
    }

    async fn bearer_token(&self, scope: CredentialScope) -> Result<Option<String>, TableError> {
        let vars = match scope {
            CredentialScope::Embedding => EMBEDDING_TOKEN_VARS,
            CredentialScope::Storage => STORAGE_TOKEN_VARS,
        };
        Ok(first_var(vars))
    }
}

/// Fixed credentials, keyed by scope.
#[derive(Default)]
pub struct StaticCredentialProvider {
    api_keys: HashMap<CredentialScope, SecretString>,
    tokens: HashMap<CredentialScope, SecretString>,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, scope: CredentialScope, key: impl Into<String>) -> Self {
        self.api_keys
            .insert(scope, SecretString::from(key.into()));
        self
    }

    pub fn with_bearer_token(mut self, scope: CredentialScope, token: impl Into<String>) -> Self {
        self.tokens.insert(scope, SecretString::from(token.into()));
        self
    }
}

impl std::fmt::Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentialProvider")
            .field("api_keys", &self.api_keys.keys().collect::<Vec<_>>())
            .field("tokens", &self.tokens.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CredentialProvider for StaticCredentialProvider {
    async fn api_key(&self, scope: CredentialScope) -> Result<Option<String>, TableError> {
        Ok(self
            .api_keys
            .get(&scope)
            .map(|s| s.expose_secret().to_string()))
    }

    async fn bearer_token(&self, scope: CredentialScope) -> Result<Option<String>, TableError> {
        Ok(self
            .tokens
            .get(&scope)
            .map(|s| s.expose_secret().to_string()))
    }
}
