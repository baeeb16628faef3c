//! Provider registry and the two structured-generation use cases.

use std::collections::BTreeMap;
use std::time::Duration;

use pulseboard_core::AppConfig;
use reqwest::Client;
use serde_json::Value;

use crate::error::LlmError;
use crate::parse::{extract_json_array, extract_json_object_matching};
use crate::prompts::{
    analytics_insights_prompt, content_suggestions_prompt, CONTENT_SYSTEM_PROMPT,
    INSIGHTS_SYSTEM_PROMPT,
};
use crate::provider::{validate_request, LlmProvider};
use crate::providers::{AnthropicProvider, GoogleProvider, OpenAiProvider};
use crate::types::{AnalyticsInsight, ContentSuggestion, LlmRequest, LlmResponse};

pub const SUGGESTIONS_TEMPERATURE: f32 = 0.8;
pub const SUGGESTIONS_MAX_TOKENS: u32 = 2000;
pub const INSIGHTS_TEMPERATURE: f32 = 0.6;
pub const INSIGHTS_MAX_TOKENS: u32 = 1500;

const INSIGHT_KEYS: [&str; 5] = [
    "summary",
    "key_findings",
    "recommendations",
    "trends",
    "opportunities",
];

/// Which providers to register. Built explicitly so the service never reads
/// the environment itself.
#[derive(Clone, Default)]
pub struct LlmSettings {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub http_timeout_secs: u64,
}

impl LlmSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            openai_api_key: config.openai_api_key.clone(),
            anthropic_api_key: config.anthropic_api_key.clone(),
            google_api_key: config.google_ai_api_key.clone(),
            http_timeout_secs: config.http_timeout_secs,
        }
    }
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "[redacted]");
        f.debug_struct("LlmSettings")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("google_api_key", &redact(&self.google_api_key))
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

#[derive(Default)]
pub struct LlmService {
    providers: BTreeMap<&'static str, Box<dyn LlmProvider>>,
}

impl LlmService {
    /// Registers exactly the providers whose API key is present and non-blank.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("pulseboard/0.1 (llm)")
            .build()?;
        let key = |k: &Option<String>| {
            k.as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ToOwned::to_owned)
        };

        let mut service = Self::default();
        if let Some(api_key) = key(&settings.openai_api_key) {
            service =
                service.with_provider(Box::new(OpenAiProvider::new(&api_key, client.clone())?));
        }
        if let Some(api_key) = key(&settings.anthropic_api_key) {
            service =
                service.with_provider(Box::new(AnthropicProvider::new(&api_key, client.clone())?));
        }
        if let Some(api_key) = key(&settings.google_api_key) {
            service = service.with_provider(Box::new(GoogleProvider::new(&api_key, client)?));
        }

        tracing::info!(
            providers = ?service.available_providers(),
            "LLM providers registered"
        );
        Ok(service)
    }

    /// Registers (or replaces) a provider under its own name.
    #[must_use]
    pub fn with_provider(mut self, provider: Box<dyn LlmProvider>) -> Self {
        self.providers.insert(provider.name(), provider);
        self
    }

    #[must_use]
    pub fn is_provider_available(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    #[must_use]
    pub fn available_providers(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }

    /// # Errors
    ///
    /// - [`LlmError::EmptyPrompt`] for a blank prompt.
    /// - [`LlmError::ProviderUnavailable`] if `provider` is not registered.
    /// - Any provider error.
    pub async fn generate(
        &self,
        provider: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        validate_request(request)?;
        let backend = self
            .providers
            .get(provider)
            .ok_or_else(|| LlmError::ProviderUnavailable(provider.to_owned()))?;
        let response = backend.generate_content(request).await?;
        tracing::debug!(
            provider,
            model = %response.model,
            total_tokens = response.usage.map(|u| u.total_tokens),
            "LLM generation completed"
        );
        Ok(response)
    }

    /// Post ideas derived from analytics, objectives and competitor data.
    ///
    /// Never fails: provider errors and unparseable output yield an empty
    /// list. Individual malformed entries are skipped.
    pub async fn generate_content_suggestions(
        &self,
        analytics_data: &Value,
        objectives: &Value,
        competitor_data: &Value,
        provider: &str,
    ) -> Vec<ContentSuggestion> {
        let request = LlmRequest::new(content_suggestions_prompt(
            analytics_data,
            objectives,
            competitor_data,
        ))
        .with_system(CONTENT_SYSTEM_PROMPT)
        .with_temperature(SUGGESTIONS_TEMPERATURE)
        .with_max_tokens(SUGGESTIONS_MAX_TOKENS)
        .with_json_output();

        let response = match self.generate(provider, &request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(provider, error = %e, "content suggestion generation failed");
                return Vec::new();
            }
        };

        let Some(items) = extract_json_array(&response.content) else {
            tracing::warn!(provider, "no JSON array found in content suggestion response");
            return Vec::new();
        };
        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<ContentSuggestion>(item) {
                Ok(suggestion) => Some(suggestion),
                Err(e) => {
                    tracing::debug!(provider, error = %e, "skipping malformed suggestion");
                    None
                }
            })
            .collect()
    }

    /// Narrative insight over aggregated and per-platform metrics.
    ///
    /// Never fails: on any error returns [`AnalyticsInsight::unparseable`].
    pub async fn generate_analytics_insights(
        &self,
        metrics: &Value,
        platform_data: &Value,
        provider: &str,
    ) -> AnalyticsInsight {
        let request = LlmRequest::new(analytics_insights_prompt(metrics, platform_data))
            .with_system(INSIGHTS_SYSTEM_PROMPT)
            .with_temperature(INSIGHTS_TEMPERATURE)
            .with_max_tokens(INSIGHTS_MAX_TOKENS)
            .with_json_output();

        let response = match self.generate(provider, &request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(provider, error = %e, "analytics insight generation failed");
                return AnalyticsInsight::unparseable();
            }
        };

        extract_json_object_matching(&response.content, |map| {
            INSIGHT_KEYS.iter().any(|key| map.contains_key(*key))
        })
        .and_then(|map| serde_json::from_value::<AnalyticsInsight>(Value::Object(map)).ok())
        .filter(|insight| !insight.is_empty())
        .unwrap_or_else(|| {
                tracing::warn!(provider, "could not parse analytics insight response");
                AnalyticsInsight::unparseable()
            })
    }
}
