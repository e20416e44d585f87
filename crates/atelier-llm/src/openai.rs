use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use atelier_core::config::{EmbeddingConfig, ModelConfig};
use atelier_core::error::{AtelierError, Result};
use atelier_core::traits::{CompletionClient, EmbeddingClient, StructuredClient};
use atelier_core::types::{ChatMessage, ChatRole};

/// OpenAI-compatible chat client. Works with OpenAI, Ollama, vLLM,
/// Groq, OpenRouter, etc.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiClient {
    /// Build a client from model configuration. The API key is read
    /// from the environment variable the config names; absence means
    /// unauthenticated requests (local servers).
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: std::env::var(&config.api_key_env).ok(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(to_oai_message).collect(),
            temperature: self.temperature,
        };

        let mut req = self.http.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AtelierError::LlmRequest(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AtelierError::LlmRequest(format!(
                "API error {}: {}",
                status, body
            )));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AtelierError::LlmParse(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AtelierError::LlmParse("response carried no content".into()))?;

        debug!(model = %self.model, chars = content.len(), "chat completion received");
        Ok(content)
    }
}

// Request/response wire types

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct OaiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn to_oai_message(msg: &ChatMessage) -> OaiMessage {
    let role = match msg.role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    };
    OaiMessage {
        role: role.to_string(),
        content: msg.content.clone(),
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move { self.chat(messages).await })
    }
}

impl StructuredClient for OpenAiClient {
    /// Ask the model for a JSON object and parse it. Output that is not
    /// JSON at all maps to `InvalidStructure` so callers with a retry
    /// budget can try again; transport failures keep their own variants.
    fn generate_json(&self, prompt: &str) -> BoxFuture<'_, Result<serde_json::Value>> {
        let messages = vec![
            ChatMessage::system(
                "Respond with ONLY a valid JSON object. No prose, no markdown outside the JSON.",
            ),
            ChatMessage::user(prompt),
        ];
        Box::pin(async move {
            let raw = self.chat(messages).await?;
            let json_str = extract_json(&raw);
            serde_json::from_str(json_str)
                .map_err(|e| AtelierError::InvalidStructure(format!("not valid JSON: {}", e)))
        })
    }
}

/// OpenAI-compatible embedding client.
pub struct OpenAiEmbeddings {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: std::env::var(&config.api_key_env).ok(),
            model: config.model.clone(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingClient for OpenAiEmbeddings {
    fn embed(&self, text: &str) -> BoxFuture<'_, Result<Vec<f32>>> {
        let text = text.to_string();
        Box::pin(async move {
            let url = format!("{}/embeddings", self.base_url);
            let mut req = self.http.post(&url).json(&EmbeddingRequest {
                model: self.model.clone(),
                input: vec![text],
            });
            if let Some(ref key) = self.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| AtelierError::LlmRequest(format!("embedding request failed: {}", e)))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(AtelierError::LlmRequest(format!(
                    "embedding API error {}: {}",
                    status, body
                )));
            }

            let body: EmbeddingResponse = resp
                .json()
                .await
                .map_err(|e| AtelierError::LlmParse(e.to_string()))?;

            body.data
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .ok_or_else(|| AtelierError::LlmParse("embedding response carried no data".into()))
        })
    }
}

/// Extract JSON from a response that may contain markdown code fences.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            return &trimmed[start..=end];
        }
    }
    trimmed
}
