use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// OAuth client registration for one upstream platform.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Externally reachable base URL; OAuth redirect URIs are built from it.
    pub public_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub sync_lookback_days: u32,
    /// API requests allowed per organization (or per caller for
    /// organization-less routes) in each one-minute window.
    pub rate_limit_per_minute: u32,
    pub meta_oauth: Option<OAuthClientCredentials>,
    pub linkedin_oauth: Option<OAuthClientCredentials>,
    pub google_oauth: Option<OAuthClientCredentials>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_ai_api_key: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[redacted]");
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("public_url", &self.public_url)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("sync_lookback_days", &self.sync_lookback_days)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field("meta_oauth", &self.meta_oauth)
            .field("linkedin_oauth", &self.linkedin_oauth)
            .field("google_oauth", &self.google_oauth)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("google_ai_api_key", &redact(&self.google_ai_api_key))
            .finish()
    }
}
