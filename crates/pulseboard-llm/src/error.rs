use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// No provider with this name is registered (usually: no API key configured).
    #[error("LLM provider not available: {0}")]
    ProviderUnavailable(String),

    #[error("{provider} API returned status {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{0} returned no content")]
    EmptyResponse(&'static str),

    #[error("failed to decode {provider} response: {source}")]
    Deserialize {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
}
