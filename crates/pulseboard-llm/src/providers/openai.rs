//! OpenAI chat completions.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::LlmError;
use crate::provider::{
    join, parse_base_url, read_json, shape_response, validate_request, LlmProvider, RawUsage,
};
use crate::types::{LlmRequest, LlmResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o";
const PROVIDER: &str = "openai";

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: Url,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
}

impl OpenAiProvider {
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidUrl`] only if the built-in base URL is invalid.
    pub fn new(api_key: &str, client: Client) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, client, DEFAULT_BASE_URL)
    }

    /// Provider pointed at a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidUrl`] if `base_url` does not parse.
    pub fn with_base_url(api_key: &str, client: Client, base_url: &str) -> Result<Self, LlmError> {
        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url: parse_base_url(base_url)?,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    async fn generate_content(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        validate_request(request)?;
        let model = request.model.as_deref().unwrap_or(DEFAULT_MODEL);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_output
                .then(|| json!({"type": "json_object"})),
        };

        let response = self
            .client
            .post(join(&self.base_url, "v1/chat/completions")?)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let parsed: ChatResponse = read_json(PROVIDER, response).await?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse(PROVIDER))?;
        let usage = parsed.usage.map(|u| RawUsage {
            prompt: u.prompt_tokens,
            completion: u.completion_tokens,
            total: u.total_tokens,
        });

        Ok(shape_response(
            PROVIDER,
            parsed.model.unwrap_or_else(|| model.to_owned()),
            &content,
            usage,
        ))
    }
}
