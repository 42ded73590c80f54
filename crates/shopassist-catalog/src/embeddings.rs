//! Embedding generation.

use crate::error::CatalogError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shopassist_core::config::{EmbeddingsConfig, OpenAiConfig};
use shopassist_core::SecretString;
use std::time::Duration;

/// Turns text into fixed-length vectors.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Model name recorded next to every stored vector.
    fn model(&self) -> &str;

    /// Length of the vectors this client produces.
    fn dimension(&self) -> usize;

    /// Whether a credential is available. Callers that are about to make
    /// many calls check this once instead of failing on every item.
    fn is_configured(&self) -> bool {
        true
    }

    /// Generate embeddings for several texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate the embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::Embedding("No embedding returned".to_string()))
    }
}

/// OpenAI `/embeddings` client.
pub struct OpenAIEmbeddings {
    client: Client,
    api_key: Option<SecretString>,
    model: String,
    base_url: String,
    dimension: usize,
}

impl OpenAIEmbeddings {
    /// Create a client with the default model. A missing key is reported on
    /// first use, not here.
    pub fn new(api_key: Option<SecretString>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            dimension: 1536,
        }
    }

    /// Build from the `openai` and `embeddings` config sections.
    pub fn from_config(openai: &OpenAiConfig, embeddings: &EmbeddingsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(openai.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: openai.credential().cloned(),
            model: embeddings.model.clone(),
            base_url: openai.base_url.trim_end_matches('/').to_string(),
            dimension: embeddings.dimensions,
        })
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (including the `/v1` prefix).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the expected vector length.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

#[async_trait]
impl EmbeddingClient for OpenAIEmbeddings {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            input: &'a [String],
        }

        #[derive(Deserialize)]
        struct Response {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            index: usize,
            embedding: Vec<f32>,
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| CatalogError::config("OpenAI API key is not configured"))?;

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&Request {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CatalogError::upstream(status.as_u16(), message));
        }

        let mut data = response.json::<Response>().await?.data;
        if data.len() != texts.len() {
            return Err(CatalogError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }
        data.sort_by_key(|d| d.index);

        for d in &data {
            if d.embedding.len() != self.dimension {
                return Err(CatalogError::Embedding(format!(
                    "Expected {}-dimensional embedding, got {}",
                    self.dimension,
                    d.embedding.len()
                )));
            }
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Euclidean (L2) distance. `None` when the lengths differ.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    Some(
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    )
}
