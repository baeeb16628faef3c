use async_trait::async_trait;
use reqwest::{Response, Url};

use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse, TokenUsage};

/// A hosted text-generation API.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Registry key, e.g. `"openai"`.
    fn name(&self) -> &'static str;

    fn default_model(&self) -> &str;

    /// # Errors
    ///
    /// Returns [`LlmError`] on validation, transport, API or decoding failure.
    async fn generate_content(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;
}

/// Rejects prompts that are empty after trimming.
///
/// # Errors
///
/// Returns [`LlmError::EmptyPrompt`].
pub fn validate_request(request: &LlmRequest) -> Result<(), LlmError> {
    if request.prompt.trim().is_empty() {
        return Err(LlmError::EmptyPrompt);
    }
    Ok(())
}

/// Usage counters as reported by a provider; any of them may be absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawUsage {
    pub prompt: Option<u32>,
    pub completion: Option<u32>,
    pub total: Option<u32>,
}

/// Builds the common response: trims content and fills in a missing total
/// from its parts. No counters at all means no usage.
#[must_use]
pub fn shape_response(
    provider: &str,
    model: impl Into<String>,
    content: &str,
    usage: Option<RawUsage>,
) -> LlmResponse {
    let usage = usage.and_then(|raw| {
        if raw.prompt.is_none() && raw.completion.is_none() && raw.total.is_none() {
            return None;
        }
        let prompt_tokens = raw.prompt.unwrap_or(0);
        let completion_tokens = raw.completion.unwrap_or(0);
        Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: raw
                .total
                .unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens)),
        })
    });

    LlmResponse {
        content: content.trim().to_owned(),
        usage,
        model: model.into(),
        provider: provider.to_owned(),
    }
}

pub(crate) fn parse_base_url(raw: &str) -> Result<Url, LlmError> {
    let normalised = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| LlmError::InvalidUrl(format!("'{raw}': {e}")))
}

pub(crate) fn join(base: &Url, path: &str) -> Result<Url, LlmError> {
    base.join(path)
        .map_err(|e| LlmError::InvalidUrl(format!("'{base}' + '{path}': {e}")))
}

/// Reads a provider response body, mapping non-2xx statuses to
/// [`LlmError::Api`] and decoding the body as `T` otherwise.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    provider: &'static str,
    response: Response,
) -> Result<T, LlmError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(serde_json::Value::as_str)
                    .map(ToOwned::to_owned)
            })
            .unwrap_or_else(|| body.chars().take(200).collect());
        return Err(LlmError::Api {
            provider,
            status: status.as_u16(),
            message,
        });
    }
    serde_json::from_str(&body).map_err(|source| LlmError::Deserialize { provider, source })
}
