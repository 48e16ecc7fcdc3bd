//! Embedding capability (spec §4.4, §9): `embed(text) -> vector`, injected
//! as a trait object so the core depends on no particular provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::VectorError;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, VectorError>;
}

/// OpenAI-compatible `/embeddings` endpoint client.
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model_name: String,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_s))
            .build()
            .expect("reqwest client");
        Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model_name: config.model_name.clone(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, VectorError> {
        let url = format!("{}/embeddings", self.api_base.trim_end_matches('/'));
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest { model: &self.model_name, input: text })
            .send()
            .await?
            .error_for_status()?
            .json::<EmbeddingResponse>()
            .await?;

        resp.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| VectorError::DimensionMismatch { expected: 1, got: 0 })
    }
}

/// Deterministic hash-based stand-in used in tests and whenever no
/// embedding provider is configured (spec §7: embedding faults degrade
/// gracefully rather than failing the query).
pub struct StubEmbedder {
    pub dim: usize,
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, VectorError> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut vector = Vec::with_capacity(self.dim);
        for i in 0..self.dim {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let bits = hasher.finish();
            vector.push(((bits % 2000) as f32 / 1000.0) - 1.0);
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_embedder_is_deterministic() {
        let embedder = StubEmbedder { dim: 8 };
        let a = embedder.embed("deep water patterns").await.unwrap();
        let b = embedder.embed("deep water patterns").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[tokio::test]
    async fn stub_embedder_differs_across_inputs() {
        let embedder = StubEmbedder { dim: 8 };
        let a = embedder.embed("deep water").await.unwrap();
        let b = embedder.embed("shallow water").await.unwrap();
        assert_ne!(a, b);
    }
}
