//! Pluggable embedding providers.
//!
//! The embedding model is an external capability: a batch of strings in,
//! one unit-length vector per string out. Implementations exist for a local
//! hashed bag-of-words model (always available, deterministic, used in tests
//! and offline builds), the OpenAI embeddings API, and a local Ollama server.
//! Remote providers use a bounded request timeout and report every failure as
//! an [`EmbeddingError`] instead of substituting placeholder vectors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, EmbeddingError};
use crate::index::l2_normalize;

/// Capability interface for embedding models.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning vectors in input order.
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text.
    async fn encode_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut out = self.encode(&[text.to_string()]).await?;
        out.pop().ok_or_else(|| EmbeddingError::ResponseParse {
            message: "provider returned no embedding".into(),
        })
    }

    /// Dimensionality of produced vectors.
    fn dimensions(&self) -> usize;

    fn provider_name(&self) -> &str;
}

/// Configuration for embedding providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: "local" (default), "openai", "ollama".
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Provider-specific model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Embedding dimensions (0 = provider/model default).
    #[serde(default)]
    pub dimensions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key for remote providers.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Batch size for bulk embedding during ingestion.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "local".into()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

fn default_batch_size() -> usize {
    32
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dimensions: 0,
            base_url: None,
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

const LOCAL_DEFAULT_DIMENSIONS: usize = 384;

/// Hashed bag-of-words embedder.
///
/// Each lowercase alphanumeric token is hashed into a bucket and its term
/// frequency accumulated; the vector is then L2-normalized. Text without any
/// token maps to the zero vector.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dimensions: usize,
}

impl LocalEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lowered = text.to_lowercase();
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            *tf.entry(word).or_insert(0) += 1;
        }

        for (term, count) in &tf {
            let idx = djb2_hash(term) % self.dimensions;
            vector[idx] += *count as f32;
        }

        l2_normalize(&mut vector);
        vector
    }
}

fn djb2_hash(s: &str) -> usize {
    let mut hash: usize = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as usize);
    }
    hash
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "local"
    }
}

/// OpenAI-compatible embeddings API client (`POST {base}/v1/embeddings`).
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    base_url: String,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingItem>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        dimensions: usize,
        timeout_secs: u64,
    ) -> Result<Self, EmbeddingError> {
        let model = model.unwrap_or_else(|| "text-embedding-3-small".into());
        let dims = if dimensions > 0 {
            dimensions
        } else {
            match model.as_str() {
                "text-embedding-3-large" => 3072,
                _ => 1536,
            }
        };
        Ok(Self {
            client: http_client(timeout_secs)?,
            api_key,
            model,
            dims,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".into()),
            timeout_secs,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let mut body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        if self.model.starts_with("text-embedding-3") {
            body["dimensions"] = serde_json::json!(self.dims);
        }

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout_secs))?;
        let resp = check_status(resp).await?;
        let mut parsed: OpenAiEmbeddingResponse =
            resp.json().await.map_err(|e| EmbeddingError::ResponseParse {
                message: e.to_string(),
            })?;
        parsed.data.sort_by_key(|item| item.index);
        let vectors = parsed.data.into_iter().map(|item| item.embedding).collect();
        finish_batch(vectors, texts.len(), self.dims)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

/// Ollama embeddings client (`POST {base}/api/embed`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    model: String,
    dims: usize,
    base_url: String,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(
        model: Option<String>,
        base_url: Option<String>,
        dimensions: usize,
        timeout_secs: u64,
    ) -> Result<Self, EmbeddingError> {
        let model = model.unwrap_or_else(|| "nomic-embed-text".into());
        let dims = if dimensions > 0 {
            dimensions
        } else {
            match model.as_str() {
                "mxbai-embed-large" => 1024,
                "all-minilm" => 384,
                _ => 768,
            }
        };
        Ok(Self {
            client: http_client(timeout_secs)?,
            model,
            dims,
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".into()),
            timeout_secs,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/api/embed", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout_secs))?;
        let resp = check_status(resp).await?;
        let parsed: OllamaEmbedResponse =
            resp.json().await.map_err(|e| EmbeddingError::ResponseParse {
                message: e.to_string(),
            })?;
        finish_batch(parsed.embeddings, texts.len(), self.dims)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, EmbeddingError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EmbeddingError::Request {
            message: format!("failed to build HTTP client: {e}"),
        })
}

fn request_error(err: reqwest::Error, timeout_secs: u64) -> EmbeddingError {
    if err.is_timeout() {
        EmbeddingError::Timeout { timeout_secs }
    } else {
        EmbeddingError::Request {
            message: err.to_string(),
        }
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, EmbeddingError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(EmbeddingError::Request {
        message: format!("HTTP {}: {}", status, truncate(&body, 300)),
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Validate a provider batch and normalize each vector to unit length.
fn finish_batch(
    mut vectors: Vec<Vec<f32>>,
    expected_count: usize,
    dims: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if vectors.len() != expected_count {
        return Err(EmbeddingError::ResponseParse {
            message: format!(
                "expected {} embeddings, provider returned {}",
                expected_count,
                vectors.len()
            ),
        });
    }
    for v in &mut vectors {
        if v.len() != dims {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dims,
                actual: v.len(),
            });
        }
        l2_normalize(v);
    }
    Ok(vectors)
}

/// Embed `texts` in batches of `batch_size`, preserving order.
pub async fn encode_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let batch_size = batch_size.max(1);
    let mut out = Vec::with_capacity(texts.len());
    for (i, batch) in texts.chunks(batch_size).enumerate() {
        let vectors = embedder.encode(batch).await?;
        if vectors.len() != batch.len() {
            return Err(EmbeddingError::ResponseParse {
                message: format!(
                    "batch {} returned {} embeddings for {} texts",
                    i,
                    vectors.len(),
                    batch.len()
                ),
            });
        }
        tracing::debug!(batch = i, size = batch.len(), "Embedded batch");
        out.extend(vectors);
    }
    Ok(out)
}

/// Build the embedder named by `config`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, ConfigError> {
    let provider_error = |e: EmbeddingError| ConfigError::Invalid {
        message: format!("failed to initialise {} embedder: {}", config.provider, e),
    };
    match config.provider.as_str() {
        "local" => {
            let dims = if config.dimensions > 0 {
                config.dimensions
            } else {
                LOCAL_DEFAULT_DIMENSIONS
            };
            Ok(Arc::new(LocalEmbedder::new(dims)))
        }
        "openai" => {
            let api_key = std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| ConfigError::Invalid {
                    message: format!(
                        "embedding provider 'openai' requires {} to be set",
                        config.api_key_env
                    ),
                })?;
            let embedder = OpenAiEmbedder::new(
                api_key,
                config.model.clone(),
                config.base_url.clone(),
                config.dimensions,
                config.timeout_secs,
            )
            .map_err(provider_error)?;
            Ok(Arc::new(embedder))
        }
        "ollama" => {
            let embedder = OllamaEmbedder::new(
                config.model.clone(),
                config.base_url.clone(),
                config.dimensions,
                config.timeout_secs,
            )
            .map_err(provider_error)?;
            Ok(Arc::new(embedder))
        }
        other => Err(ConfigError::Invalid {
            message: format!("unknown embedding provider '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::is_unit;

    #[tokio::test]
    async fn test_local_embedder_dimensions() {
        let embedder = LocalEmbedder::new(128);
        let v = embedder.encode_one("hello world").await.unwrap();
        assert_eq!(v.len(), 128);
        assert_eq!(embedder.dimensions(), 128);
    }

    #[test]
    fn test_local_embedder_normalized() {
        let embedder = LocalEmbedder::new(128);
        let v = embedder.embed_text("test input text for normalization");
        assert!(is_unit(&v));
    }

    #[test]
    fn test_local_embedder_empty_text() {
        let embedder = LocalEmbedder::new(64);
        let v = embedder.embed_text("?!");
        assert_eq!(v.len(), 64);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_local_embedder_deterministic_and_case_insensitive() {
        let embedder = LocalEmbedder::new(128);
        assert_eq!(embedder.embed_text("Water Damage"), embedder.embed_text("water damage"));
        assert_ne!(embedder.embed_text("water damage"), embedder.embed_text("late fee"));
    }

    #[tokio::test]
    async fn test_encode_preserves_order() {
        let embedder = LocalEmbedder::new(64);
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let out = embedder.encode(&texts).await.unwrap();
        assert_eq!(out[0], embedder.embed_text("alpha"));
        assert_eq!(out[1], embedder.embed_text("beta"));
    }

    #[tokio::test]
    async fn test_encode_in_batches() {
        let embedder = LocalEmbedder::new(32);
        let texts: Vec<String> = (0..7).map(|i| format!("clause {i}")).collect();
        let out = encode_in_batches(&embedder, &texts, 3).await.unwrap();
        assert_eq!(out.len(), 7);
        assert_eq!(out[6], embedder.embed_text("clause 6"));
    }

    #[test]
    fn test_finish_batch_rejects_wrong_count() {
        let err = finish_batch(vec![vec![1.0, 0.0]], 2, 2).unwrap_err();
        assert!(matches!(err, EmbeddingError::ResponseParse { .. }));
    }

    #[test]
    fn test_finish_batch_rejects_wrong_dimension() {
        let err = finish_batch(vec![vec![1.0, 0.0, 0.0]], 1, 2).unwrap_err();
        assert_eq!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_finish_batch_normalizes() {
        let out = finish_batch(vec![vec![3.0, 4.0]], 1, 2).unwrap();
        assert!(is_unit(&out[0]));
    }

    #[test]
    fn test_embedding_config_defaults() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "local");
        assert!(config.model.is_none());
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_embedding_config_deserialize_empty() {
        let config: EmbeddingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EmbeddingConfig::default());
    }

    #[test]
    fn test_create_embedder_default_local() {
        let embedder = create_embedder(&EmbeddingConfig::default()).unwrap();
        assert_eq!(embedder.provider_name(), "local");
        assert_eq!(embedder.dimensions(), LOCAL_DEFAULT_DIMENSIONS);
    }

    #[test]
    fn test_create_embedder_openai_without_key_fails() {
        let config = EmbeddingConfig {
            provider: "openai".into(),
            api_key_env: "CLAUSESEEK_TEST_UNSET_KEY".into(),
            ..Default::default()
        };
        assert!(create_embedder(&config).is_err());
    }

    #[test]
    fn test_create_embedder_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "word2vec".into(),
            ..Default::default()
        };
        let err = create_embedder(&config).err().unwrap();
        assert!(err.to_string().contains("word2vec"));
    }

    #[test]
    fn test_ollama_default_dimensions() {
        let embedder = OllamaEmbedder::new(None, None, 0, 5).unwrap();
        assert_eq!(embedder.dimensions(), 768);
        assert_eq!(embedder.provider_name(), "ollama");
    }

    #[test]
    fn test_openai_dimension_override() {
        let embedder =
            OpenAiEmbedder::new("key".into(), None, None, 256, 5).unwrap();
        assert_eq!(embedder.dimensions(), 256);
    }

    #[tokio::test]
    async fn test_ollama_unreachable_is_error() {
        let embedder =
            OllamaEmbedder::new(None, Some("http://127.0.0.1:9".into()), 0, 2).unwrap();
        let err = embedder.encode_one("hello").await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::Request { .. } | EmbeddingError::Timeout { .. }
        ));
    }
}
