//! Google Gemini `generateContent`.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{
    join, parse_base_url, read_json, shape_response, validate_request, LlmProvider, RawUsage,
};
use crate::types::{LlmRequest, LlmResponse};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const PROVIDER: &str = "google";

pub struct GoogleProvider {
    client: Client,
    api_key: String,
    base_url: Url,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

impl GoogleProvider {
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
impl LlmProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    async fn generate_content(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        validate_request(request)?;
        let model = request.model.as_deref().unwrap_or(DEFAULT_MODEL);

        let body = GenerateRequest {
            contents: [Content {
                role: Some("user"),
                parts: [Part {
                    text: &request.prompt,
                }],
            }],
            system_instruction: request.system.as_deref().map(|text| Content {
                role: None,
                parts: [Part { text }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type: request.json_output.then_some("application/json"),
            },
        };

        let mut url = join(&self.base_url, &format!("v1beta/models/{model}:generateContent"))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);

        let response = self.client.post(url).json(&body).send().await?;
        let parsed: GenerateResponse = read_json(PROVIDER, response).await?;

        let content: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(LlmError::EmptyResponse(PROVIDER));
        }
        let usage = parsed.usage_metadata.map(|u| RawUsage {
            prompt: u.prompt_token_count,
            completion: u.candidates_token_count,
            total: u.total_token_count,
        });

        Ok(shape_response(
            PROVIDER,
            parsed.model_version.unwrap_or_else(|| model.to_owned()),
            &content,
            usage,
        ))
    }
}
