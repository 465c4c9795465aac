//! FastEmbed-based local embedding generator.
//!
//! Implements the `Embedder` trait from `tabula-core` using fastembed's
//! BGESmallENV15 model (384 dimensions) with ONNX runtime inference.
//! Model loading and inference are CPU-bound and run on the blocking pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use tabula_core::embedding::embedder::Embedder;
use tabula_types::error::TableError;

use crate::schema::DEFAULT_EMBEDDING_DIMENSION;

const MODEL_NAME: &str = "BAAI/bge-small-en-v1.5";

/// Local embedder backed by an ONNX model.
pub struct FastEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedder {
    /// Load the model, downloading it into `cache_dir` on first use.
    pub async fn new(cache_dir: Option<PathBuf>) -> Result<Self, TableError> {
        let model = tokio::task::spawn_blocking(move || {
            let mut options =
                InitOptions::new(EmbeddingModel::BGESmallENV15).with_show_download_progress(false);
            if let Some(dir) = cache_dir {
                options = options.with_cache_dir(dir);
            }
            TextEmbedding::try_new(options)
        })
        .await
        .map_err(|e| TableError::Embedding(format!("model load task failed: {e}")))?
        .map_err(|e| TableError::Embedding(format!("failed to load {MODEL_NAME}: {e}")))?;

        tracing::info!(model = MODEL_NAME, "Local embedding model loaded");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

impl Embedder for FastEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TableError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            model
                .lock()
                .map_err(|_| TableError::Embedding("embedding model lock poisoned".to_string()))?
                .embed(texts, None)
                .map_err(|e| TableError::Embedding(e.to_string()))
        })
        .await
        .map_err(|e| TableError::Embedding(format!("embedding task failed: {e}")))?
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    fn dimension(&self) -> usize {
        DEFAULT_EMBEDDING_DIMENSION
    }
}
