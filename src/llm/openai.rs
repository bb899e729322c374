use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parsing::parse_json_object;
use super::ChatProvider;
use crate::config::Settings;

/// OpenAI chat-completions provider with structured output.
pub struct OpenAiChat {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaSpec<'a>,
}

#[derive(Serialize)]
struct JsonSchemaSpec<'a> {
    name: &'a str,
    schema: &'a Value,
    strict: bool,
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

impl OpenAiChat {
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
impl ChatProvider for OpenAiChat {
    async fn chat_structured(
        &self,
        system: &str,
        user: &str,
        schema_name: &str,
        schema: &Value,
    ) -> Result<Value> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: 4096,
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaSpec {
                    name: schema_name,
                    schema,
                    strict: false,
                },
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

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
