//! Anthropic Messages API.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{
    join, parse_base_url, read_json, shape_response, validate_request, LlmProvider, RawUsage,
};
use crate::types::{LlmRequest, LlmResponse};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const API_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "anthropic";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: Url,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

impl AnthropicProvider {
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidUrl`] only if the built-in base URL is invalid.
    pub fn new(api_key: &str, client: Client) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, client, DEFAULT_BASE_URL)
    }

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
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    // The Messages API has no JSON mode; `json_output` relies on the prompt.
    async fn generate_content(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        validate_request(request)?;
        let model = request.model.as_deref().unwrap_or(DEFAULT_MODEL);

        let body = MessagesRequest {
            model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.as_deref(),
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(join(&self.base_url, "v1/messages")?)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let parsed: MessagesResponse = read_json(PROVIDER, response).await?;

        let content: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();
        if content.is_empty() {
            return Err(LlmError::EmptyResponse(PROVIDER));
        }
        let usage = parsed.usage.map(|u| RawUsage {
            prompt: u.input_tokens,
            completion: u.output_tokens,
            total: None,
        });

        Ok(shape_response(
            PROVIDER,
            parsed.model.unwrap_or_else(|| model.to_owned()),
            &content,
            usage,
        ))
    }
}
