//! OpenAI-compatible remote embedder.
//!
//! Talks to either the OpenAI `/embeddings` endpoint (bearer key) or an Azure
//! OpenAI deployment (`api-key` header, or a bearer token from Entra ID).
//! Credentials are wrapped in [`SecretString`] and only exposed when building
//! request headers.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use tabula_core::embedding::embedder::Embedder;
use tabula_types::error::TableError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";

/// Output width of well-known embedding models.
pub fn known_dimension(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

/// How requests are authenticated.
pub enum EmbeddingAuth {
    /// `api-key: <key>` (Azure key auth).
    ApiKeyHeader(SecretString),
    /// `Authorization: Bearer <token>` (OpenAI keys, Azure Entra tokens).
    Bearer(SecretString),
}

/// Remote embedder over an OpenAI-compatible HTTP API.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    url: String,
    auth: EmbeddingAuth,
    /// Sent in the body for OpenAI; Azure takes the model from the deployment.
    request_model: Option<String>,
    model: String,
    dimension: usize,
    /// Sent as `dimensions` when the caller asked for a specific width.
    requested_dimensions: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedder {
    /// Embedder for the OpenAI API (or any compatible server at `base_url`).
    pub fn openai(
        base_url: &str,
        model: impl Into<String>,
        api_key: SecretString,
        dimensions: Option<usize>,
        timeout: Duration,
    ) -> Result<Self, TableError> {
        let model = model.into();
        let dimension = resolve_dimension(&model, dimensions)?;
        Ok(Self {
            client: http_client(timeout)?,
            url: format!("{}/embeddings", base_url.trim_end_matches('/')),
            auth: EmbeddingAuth::Bearer(api_key),
            request_model: Some(model.clone()),
            model,
            dimension,
            requested_dimensions: dimensions,
        })
    }

    /// Embedder for an Azure OpenAI deployment.
    ///
    /// `model` names the model behind the deployment and determines the
    /// vector width when `dimensions` is not given.
    pub fn azure(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        model: impl Into<String>,
        auth: EmbeddingAuth,
        dimensions: Option<usize>,
        timeout: Duration,
    ) -> Result<Self, TableError> {
        let model = model.into();
        let dimension = resolve_dimension(&model, dimensions)?;
        Ok(Self {
            client: http_client(timeout)?,
            url: format!(
                "{}/openai/deployments/{deployment}/embeddings?api-version={api_version}",
                endpoint.trim_end_matches('/')
            ),
            auth,
            request_model: None,
            model,
            dimension,
            requested_dimensions: dimensions,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request<'a>(&'a self, texts: &'a [String]) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            input: texts,
            model: self.request_model.as_deref(),
            dimensions: self.requested_dimensions,
        }
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, TableError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TableError::Config(format!("failed to create HTTP client: {e}")))
}

fn resolve_dimension(model: &str, dimensions: Option<usize>) -> Result<usize, TableError> {
    dimensions.or_else(|| known_dimension(model)).ok_or_else(|| {
        TableError::Config(format!(
            "unknown output width for embedding model '{model}', set embedder.dimensions"
        ))
    })
}

/// Put the vectors back in input order and check none are missing.
fn into_vectors(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>, TableError> {
    let mut data = response.data;
    data.sort_by_key(|d| d.index);
    if data.len() != expected {
        return Err(TableError::Embedding(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TableError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let builder = self.client.post(&self.url).json(&self.request(texts));
        let builder = match &self.auth {
            EmbeddingAuth::ApiKeyHeader(key) => builder.header("api-key", key.expose_secret()),
            EmbeddingAuth::Bearer(token) => builder.bearer_auth(token.expose_secret()),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TableError::Embedding(format!("embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TableError::Embedding(format!(
                "embedding API error ({status}): {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| TableError::Embedding(format!("invalid embedding response: {e}")))?;
        tracing::debug!(model = %self.model, count = texts.len(), "Embedded texts");
        into_vectors(parsed, texts.len())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretString {
        SecretString::from("sk-test".to_string())
    }

    #[test]
    fn test_openai_url_and_body() {
        let embedder = OpenAiEmbedder::openai(
            "https://api.openai.com/v1/",
            "text-embedding-3-small",
            key(),
            None,
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(embedder.url(), "https://api.openai.com/v1/embeddings");
        assert_eq!(embedder.dimension(), 1536);

        let texts = vec!["hello".to_string()];
        let body = serde_json::to_value(embedder.request(&texts)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"input": ["hello"], "model": "text-embedding-3-small"})
        );
    }

    #[test]
    fn test_azure_url_omits_model_and_sends_dimensions() {
        let embedder = OpenAiEmbedder::azure(
            "https://res.openai.azure.com/",
            "embed-deploy",
            "2024-02-01",
            "text-embedding-3-large",
            EmbeddingAuth::ApiKeyHeader(key()),
            Some(256),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            embedder.url(),
            "https://res.openai.azure.com/openai/deployments/embed-deploy/embeddings?api-version=2024-02-01"
        );
        assert_eq!(embedder.dimension(), 256);

        let texts = vec!["a".to_string(), "b".to_string()];
        let body = serde_json::to_value(embedder.request(&texts)).unwrap();
        assert_eq!(body, serde_json::json!({"input": ["a", "b"], "dimensions": 256}));
    }

    #[test]
    fn test_unknown_model_needs_dimensions() {
        let result = OpenAiEmbedder::openai(
            DEFAULT_OPENAI_BASE_URL,
            "my-custom-model",
            key(),
            None,
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(TableError::Config(_))));
    }

    #[test]
    fn test_response_is_reordered_by_index() {
        let response: EmbeddingResponse = serde_json::from_str(
            r#"{"data": [
                {"embedding": [0.2], "index": 1},
                {"embedding": [0.1], "index": 0}
            ]}"#,
        )
        .unwrap();
        let vectors = into_vectors(response, 2).unwrap();
        assert_eq!(vectors, vec![vec![0.1], vec![0.2]]);
    }

    #[test]
    fn test_short_response_is_an_error() {
        let response: EmbeddingResponse =
            serde_json::from_str(r#"{"data": [{"embedding": [0.1], "index": 0}]}"#).unwrap();
        let err = into_vectors(response, 2).unwrap_err();
        assert!(matches!(err, TableError::Embedding(_)));
    }
}
