mod embeddings;
mod files;
mod openai;
pub(crate) mod parsing;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub use embeddings::OpenAiEmbedder;
pub use files::OpenAiFiles;
pub use openai::OpenAiChat;

/// Maximum inputs per embedding provider call.
pub const EMBED_BATCH_SIZE: usize = 2048;

/// Schema-constrained chat completion.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one completion and return the parsed JSON object. The provider
    /// is instructed to conform to `schema`; the caller still validates.
    async fn chat_structured(
        &self,
        system: &str,
        user: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value>;
}

/// Text-to-vector provider, batched.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Multi-modal provider for the PDF-native branch: upload once, then ask
/// schema-constrained questions against the uploaded file.
#[async_trait]
pub trait FileChatProvider: Send + Sync {
    async fn upload(&self, path: &Path, file_name: &str) -> Result<String>;

    async fn respond_with_file(
        &self,
        file_ref: &str,
        system: &str,
        instruction: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value>;
}
