//! Configuration loader for Tabula.
//!
//! Reads `config.toml` from the data directory (`~/.tabula/` by default) and
//! deserializes it into [`TabulaConfig`]. Falls back to defaults when the
//! file is missing or malformed, then applies environment overrides.

use std::path::{Path, PathBuf};

use tabula_types::config::{StorageConfig, TabulaConfig};

/// Overrides the storage location with a raw URI (or a local path).
pub const STORAGE_URI_ENV: &str = "TABULA_STORAGE_URI";
/// Overrides `database.embedder_provider`.
pub const EMBEDDER_PROVIDER_ENV: &str = "TABULA_EMBEDDER_PROVIDER";
/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "TABULA_DATA_DIR";

/// Load configuration from `{data_dir}/config.toml`, then apply environment
/// overrides.
///
/// - If the file does not exist, the defaults are used.
/// - If the file exists but fails to parse, logs a warning and uses the defaults.
pub async fn load_config(data_dir: &Path) -> TabulaConfig {
    let config_path = data_dir.join("config.toml");

    let config = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => match toml::from_str::<TabulaConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    "Failed to parse {}: {err}, using defaults",
                    config_path.display()
                );
                TabulaConfig::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            TabulaConfig::default()
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            TabulaConfig::default()
        }
    };

    apply_env_overrides(config)
}

/// Apply `TABULA_STORAGE_URI` and `TABULA_EMBEDDER_PROVIDER` from the process
/// environment.
pub fn apply_env_overrides(config: TabulaConfig) -> TabulaConfig {
    apply_overrides(
        config,
        non_empty_var(STORAGE_URI_ENV),
        non_empty_var(EMBEDDER_PROVIDER_ENV),
    )
}

/// Apply explicit overrides. A storage URI without a scheme is taken as a
/// local path.
pub fn apply_overrides(
    mut config: TabulaConfig,
    storage_uri: Option<String>,
    embedder_provider: Option<String>,
) -> TabulaConfig {
    if let Some(uri) = storage_uri {
        tracing::debug!(%uri, "Storage location overridden from environment");
        config.database.storage = if uri.contains("://") {
            StorageConfig::Uri { uri }
        } else {
            StorageConfig::Local {
                path: Some(PathBuf::from(uri)),
            }
        };
    }
    if let Some(provider) = embedder_provider {
        tracing::debug!(%provider, "Embedder provider overridden from environment");
        config.database.embedder_provider = provider;
    }
    config
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve the data directory.
///
/// Priority:
/// 1. `TABULA_DATA_DIR` environment variable
/// 2. `~/.tabula`
/// 3. `./.tabula`
pub fn resolve_data_dir() -> PathBuf {
    if let Some(dir) = non_empty_var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".tabula");
    }

    PathBuf::from(".tabula")
}
