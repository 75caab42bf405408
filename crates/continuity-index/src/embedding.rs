use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{IndexError, Result};

const WARMUP_TIMEOUT_SECS: u64 = 5;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Which side of a search a text belongs to. Some embedding models expect a
/// distinct prefix for documents being indexed versus queries being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedPurpose {
    Document,
    Query,
}

impl EmbedPurpose {
    fn prefix(self) -> &'static str {
        match self {
            EmbedPurpose::Document => "search_document: ",
            EmbedPurpose::Query => "search_query: ",
        }
    }
}

/// A source of text embeddings. Implementations may be a remote HTTP
/// endpoint, a bundled local model, or anything that produces fixed-width
/// float vectors. `dimension` is only meaningful after at least one
/// successful embed call.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String], purpose: EmbedPurpose) -> Result<Vec<Vec<f32>>>;

    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Calls an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl HttpEmbeddingProvider {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }

    /// Single-text warmup probe used to discover the provider's output
    /// dimension. Uses a tighter timeout than ordinary requests.
    pub async fn warmup(&self) -> Result<usize> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(WARMUP_TIMEOUT_SECS))
            .build()
            .map_err(|e| IndexError::Embedding(e.to_string()))?;
        let probe = vec!["search_document: warmup".to_string()];
        let body = EmbeddingRequest { input: &probe, model: &self.model };
        let resp = client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::Embedding(format!("warmup probe failed: {e}")))?;
        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| IndexError::Embedding(format!("warmup probe parse failed: {e}")))?;
        let dim = parsed.data.first().map(|d| d.embedding.len()).unwrap_or(0);
        debug!(endpoint = %self.endpoint, dim, "embedding warmup complete");
        Ok(dim)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, texts: &[String], purpose: EmbedPurpose) -> Result<Vec<Vec<f32>>> {
        let prefixed: Vec<String> = texts.iter().map(|t| format!("{}{}", purpose.prefix(), t)).collect();
        let body = EmbeddingRequest { input: &prefixed, model: &self.model };

        let resp = self.client.post(&self.endpoint).json(&body).send().await.map_err(|e| {
            warn!(endpoint = %self.endpoint, error = %e, "embedding request failed");
            IndexError::Embedding(e.to_string())
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(IndexError::Embedding(format!("embedding endpoint returned {status}: {text}")));
        }

        let parsed: EmbeddingResponse =
            resp.json().await.map_err(|e| IndexError::Embedding(format!("invalid embedding response: {e}")))?;
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Tries each provider in order, falling back to the next on failure.
///
/// The preference order named by the host configuration is: a remote HTTP
/// endpoint first, then a local embedding library, then a feature-extraction
/// pipeline with mean pooling and L2 normalization. Only the HTTP tier is
/// wired concretely here; the other two are reachable by implementing
/// [`EmbeddingProvider`] and appending to the chain, without requiring this
/// crate to carry a model-runtime dependency it does not otherwise use.
pub struct ProviderChain {
    providers: Vec<Box<dyn EmbeddingProvider>>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Box<dyn EmbeddingProvider>>) -> Self {
        Self { providers }
    }

    pub async fn embed(&self, texts: &[String], purpose: EmbedPurpose) -> Result<Vec<Vec<f32>>> {
        let mut last_err = None;
        for provider in &self.providers {
            match provider.embed(texts, purpose).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "embedding provider failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| IndexError::Embedding("no embedding providers configured".into())))
    }
}

pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn mean_pool(token_embeddings: &[Vec<f32>]) -> Vec<f32> {
    if token_embeddings.is_empty() {
        return Vec::new();
    }
    let dim = token_embeddings[0].len();
    let mut pooled = vec![0f32; dim];
    for emb in token_embeddings {
        for (i, v) in emb.iter().enumerate() {
            pooled[i] += v;
        }
    }
    let n = token_embeddings.len() as f32;
    for v in pooled.iter_mut() {
        *v /= n;
    }
    pooled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_normalize_unit_length() {
        let mut v = vec![3.0f32, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mean_pool_averages_columns() {
        let tokens = vec![vec![1.0, 1.0], vec![3.0, 5.0]];
        let pooled = mean_pool(&tokens);
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn purpose_prefixes_differ() {
        assert_eq!(EmbedPurpose::Document.prefix(), "search_document: ");
        assert_eq!(EmbedPurpose::Query.prefix(), "search_query: ");
    }
}
