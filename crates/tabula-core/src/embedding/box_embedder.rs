//! BoxEmbedder -- object-safe dynamic dispatch wrapper for Embedder.
//!
//! 1. Define an object-safe `EmbedderDyn` trait with boxed futures
//! 2. Blanket-impl `EmbedderDyn` for all `T: Embedder`
//! 3. `BoxEmbedder` wraps `Box<dyn EmbedderDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use tabula_types::error::TableError;

use super::embedder::Embedder;

/// Object-safe version of [`Embedder`] with boxed futures.
pub trait EmbedderDyn: Send + Sync {
    fn embed_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, TableError>> + Send + 'a>>;

    fn model_name_dyn(&self) -> &str;

    fn dimension_dyn(&self) -> usize;
}

impl<T: Embedder> EmbedderDyn for T {
    fn embed_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>, TableError>> + Send + 'a>> {
        Box::pin(self.embed(texts))
    }

    fn model_name_dyn(&self) -> &str {
        self.model_name()
    }

    fn dimension_dyn(&self) -> usize {
        self.dimension()
    }
}

/// Type-erased embedder for runtime selection by provider name.
///
/// Since `Embedder` uses RPITIT, it cannot be used as a trait object directly.
pub struct BoxEmbedder {
    inner: Box<dyn EmbedderDyn + Send + Sync>,
}

impl BoxEmbedder {
    pub fn new<T: Embedder + 'static>(embedder: T) -> Self {
        Self {
            inner: Box::new(embedder),
        }
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TableError> {
        self.inner.embed_boxed(texts).await
    }

    /// Embed a single text, failing if the provider returns no vector.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, TableError> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                TableError::Embedding(format!(
                    "embedder '{}' returned no vector",
                    self.model_name()
                ))
            })
    }

    pub fn model_name(&self) -> &str {
        self.inner.model_name_dyn()
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension_dyn()
    }
}

impl std::fmt::Debug for BoxEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxEmbedder")
            .field("model", &self.model_name())
            .field("dimension", &self.dimension())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthEmbedder;

    impl Embedder for LengthEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TableError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn model_name(&self) -> &str {
            "length"
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct SilentEmbedder;

    impl Embedder for SilentEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, TableError> {
            Ok(Vec::new())
        }

        fn model_name(&self) -> &str {
            "silent"
        }

        fn dimension(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn test_box_embedder_delegates() {
        let embedder = BoxEmbedder::new(LengthEmbedder);
        assert_eq!(embedder.model_name(), "length");
        assert_eq!(embedder.dimension(), 2);

        let vectors = embedder
            .embed(&["abc".to_string(), "hello".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![3.0, 1.0], vec![5.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_one_requires_a_vector() {
        let embedder = BoxEmbedder::new(LengthEmbedder);
        assert_eq!(embedder.embed_one("ab").await.unwrap(), vec![2.0, 1.0]);

        let silent = BoxEmbedder::new(SilentEmbedder);
        let err = silent.embed_one("ab").await.unwrap_err();
        assert!(matches!(err, TableError::Embedding(_)));
    }
}
