//! LLM provider layer for Pulseboard.
//!
//! [`LlmService`] is a registry of [`LlmProvider`]s (OpenAI, Anthropic,
//! Google) built from explicit [`LlmSettings`], plus the two structured use
//! cases the dashboard needs: content suggestions and analytics insights.

pub mod error;
pub mod parse;
pub mod prompts;
pub mod provider;
pub mod providers;
pub mod service;
pub mod types;

pub use error::LlmError;
pub use parse::{extract_json_array, extract_json_object, extract_json_object_matching};
pub use provider::{shape_response, validate_request, LlmProvider, RawUsage};
pub use providers::{AnthropicProvider, GoogleProvider, OpenAiProvider};
pub use service::{LlmService, LlmSettings};
pub use types::{
    AnalyticsInsight, ContentSuggestion, LlmRequest, LlmResponse, TokenUsage,
    INSIGHT_PARSE_FAILURE,
};
