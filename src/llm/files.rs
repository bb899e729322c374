use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::parsing::parse_json_object;
use super::FileChatProvider;
use crate::config::Settings;

/// OpenAI Files-based multi-modal provider: the raw PDF is uploaded once
/// and each block question references it by file id.
pub struct OpenAiFiles {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Deserialize)]
struct FileUploadResponse {
    id: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiFiles {
    pub fn new(settings: &Settings) -> Result<Self> {
        if settings.openai_api_key.is_empty() {
            anyhow::bail!("OpenAI API key is required. Set OPENAI_API_KEY environment variable.");
        }

        Ok(Self {
            client: Client::new(),
            api_key: settings.openai_api_key.clone(),
            model: settings.chat_model.clone(),
            base_url: settings.openai_base_url.clone(),
        })
    }
}

#[async_trait]
impl FileChatProvider for OpenAiFiles {
    async fn upload(&self, path: &Path, file_name: &str) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read file for upload: {}", path.display()))?;

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .context("invalid mime type for upload")?;
        let form = multipart::Form::new()
            .text("purpose", "user_data")
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .context("Failed to upload file to OpenAI")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("File upload error ({}): {}", status, error_text);
        }

        let uploaded: FileUploadResponse = response
            .json()
            .await
            .context("Failed to parse file upload response")?;

        Ok(uploaded.id)
    }

    async fn respond_with_file(
        &self,
        file_ref: &str,
        system: &str,
        instruction: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value> {
        let request = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                {
                    "role": "user",
                    "content": [
                        { "type": "file", "file": { "file_id": file_ref } },
                        { "type": "text", "text": instruction },
                    ],
                },
            ],
            "max_tokens": 4096,
            "temperature": 0.0,
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": schema_name, "schema": schema, "strict": false },
            },
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send multi-modal request to OpenAI")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        let response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .context("No content in OpenAI response")?;

        parse_json_object(&content)
    }
}
