use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{ConfigError, IndexError};

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 256;

/// External embedding capability: a batch of strings in, one fixed-dimension
/// vector per string out, in the same order. The dimension is a provider
/// property fixed at configuration time; index build and query must agree on
/// it.
#[async_trait]
pub trait EmbeddingProvider {
    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError>;
}

/// Parses an `ngram-<dims>` model identifier into its vector width.
pub fn parse_ngram_dimensions(model: &str) -> Result<usize, ConfigError> {
    model
        .strip_prefix("ngram-")
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|dims| *dims > 0)
        .ok_or_else(|| ConfigError::InvalidVar {
            name: "EMBEDDING_MODEL",
            reason: format!(
                "expected `ngram-<dims>` when no EMBEDDING_ENDPOINT is set, got `{model}`"
            ),
        })
}

/// Deterministic character-trigram embedder. Each trigram is FNV-hashed into
/// a bucket of a fixed-width vector and the counts are L2-normalized. A
/// self-contained stand-in for a hosted embedding model wherever determinism
/// matters more than semantic quality.
#[derive(Debug, Clone, Copy)]
pub struct NgramHashEmbedder {
    dimensions: usize,
}

impl NgramHashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        for window in chars.windows(3) {
            let mut hash = 0xcbf2_9ce4_8422_2325u64;
            let mut buf = [0u8; 4];
            for ch in window {
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    hash ^= u64::from(byte);
                    hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
                }
            }
            let bucket = (hash % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

impl Default for NgramHashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingProvider for NgramHashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    vectors: Vec<Vec<f32>>,
}

/// Embedding provider backed by a remote batch endpoint: POSTs
/// `{model, texts}` and expects `{vectors}` back, one vector per input.
pub struct HttpEmbedder {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
    client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
            dimensions,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let mut request = self.client.post(&self.endpoint).json(&EmbedRequest {
            model: &self.model,
            texts,
        });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(IndexError::Embedding(format!(
                "embedding endpoint returned {}",
                response.status()
            )));
        }

        let payload: EmbedResponse = response.json().await?;
        if payload.vectors.len() != texts.len() {
            return Err(IndexError::Embedding(format!(
                "embedding count {} does not match input count {}",
                payload.vectors.len(),
                texts.len()
            )));
        }

        Ok(payload.vectors)
    }
}

/// The embedding provider selected by configuration: the remote endpoint when
/// one is configured, the local n-gram embedder otherwise.
pub enum ConfiguredEmbedder {
    Ngram(NgramHashEmbedder),
    Http(HttpEmbedder),
}

impl ConfiguredEmbedder {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        if let Some(endpoint) = &config.embedding_endpoint {
            return Ok(Self::Http(HttpEmbedder::new(
                endpoint.clone(),
                config.embedding_model.clone(),
                config.embedding_api_key.clone(),
                config.embedding_dimensions,
            )));
        }

        let dimensions = parse_ngram_dimensions(&config.embedding_model)?;
        Ok(Self::Ngram(NgramHashEmbedder::new(dimensions)))
    }
}

#[async_trait]
impl EmbeddingProvider for ConfiguredEmbedder {
    fn dimensions(&self) -> usize {
        match self {
            Self::Ngram(inner) => inner.dimensions(),
            Self::Http(inner) => inner.dimensions(),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        match self {
            Self::Ngram(inner) => inner.embed_batch(texts).await,
            Self::Http(inner) => inner.embed_batch(texts).await,
        }
    }
}
