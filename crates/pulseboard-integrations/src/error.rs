use pulseboard_core::PlatformType;
use thiserror::Error;

/// Errors raised by the OAuth session, platform adapters, the factory and
/// the sync orchestrator.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The provider rejected the access token and no refresh could fix it.
    #[error("unauthorized request to {url}")]
    Unauthorized { url: String },

    #[error("no refresh token stored for this connection")]
    MissingRefreshToken,

    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    /// A prerequisite upstream resource (page, organization, property) is absent.
    #[error("missing upstream resource: {0}")]
    MissingResource(String),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported platform type: {0}")]
    UnsupportedPlatform(String),

    #[error("OAuth client credentials are not configured for {0}")]
    MissingClientCredentials(PlatformType),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] pulseboard_db::DbError),
}

impl IntegrationError {
    /// Authentication failures abort a whole sync instead of degrading a
    /// single day to zero metrics.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            IntegrationError::Unauthorized { .. }
                | IntegrationError::MissingRefreshToken
                | IntegrationError::TokenRefresh(_)
        )
    }
}
