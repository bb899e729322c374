use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{EmbeddingProvider, EMBED_BATCH_SIZE};
use crate::config::Settings;

/// OpenAI embeddings provider. One model identifier is used for the whole
/// lifetime of the value, so every vector in a job shares a dimension.
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(settings: &Settings) -> Result<Self> {
        if settings.openai_api_key.is_empty() {
            anyhow::bail!("OpenAI API key is required. Set OPENAI_API_KEY environment variable.");
        }

        Ok(Self {
            client: Client::new(),
            api_key: settings.openai_api_key.clone(),
            model: settings.embedding_model.clone(),
            base_url: settings.openai_base_url.clone(),
        })
    }

    async fn embed_one_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: batch,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to the embeddings API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Embeddings API error ({}): {}", status, error_text);
        }

        let mut response: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embeddings response")?;

        if response.data.len() != batch.len() {
            anyhow::bail!(
                "embeddings API returned {} vectors for {} inputs",
                response.data.len(),
                batch.len()
            );
        }

        // The API is free to reorder; `index` is authoritative.
        response.data.sort_by_key(|item| item.index);
        Ok(response.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            vectors.extend(self.embed_one_batch(batch).await?);
        }

        if let Some(first) = vectors.first() {
            let dimension = first.len();
            if vectors.iter().any(|v| v.len() != dimension) {
                anyhow::bail!("embedding dimension mismatch across chunks");
            }
        }

        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let input = vec![text.to_string()];
        let vectors = self.embed_one_batch(&input).await?;
        vectors
            .into_iter()
            .next()
            .context("embeddings API returned no vector for the query")
    }
}
