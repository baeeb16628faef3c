//! Builds platform adapters from a storage key and handles the OAuth
//! authorization-code leg of connecting a new data stream.

use std::time::Duration;

use chrono::Utc;
use pulseboard_core::{AppConfig, IntegrationConfig, OAuthClientCredentials, PlatformType};
use rand::Rng;
use reqwest::{Client, Url};
use serde::Serialize;
use uuid::Uuid;

use crate::error::IntegrationError;
use crate::integration::Integration;
use crate::platforms::{
    GoogleAnalyticsIntegration, LinkedInIntegration, MetaIntegration, PlatformEndpoints,
};
use crate::session::read_token_response;

const OAUTH_STATE_LEN: usize = 32;

const META_SCOPES: &str = "pages_show_list,pages_read_engagement,read_insights,\
                           instagram_basic,instagram_manage_insights";
const LINKEDIN_SCOPES: &str = "r_organization_social rw_organization_admin r_basicprofile";
const GOOGLE_SCOPES: &str = "https://www.googleapis.com/auth/analytics.readonly";

/// OAuth application credentials per platform plus the public base URL used
/// to build redirect URIs.
#[derive(Debug, Clone, Default)]
pub struct OAuthClients {
    pub meta: Option<OAuthClientCredentials>,
    pub linkedin: Option<OAuthClientCredentials>,
    pub google: Option<OAuthClientCredentials>,
    pub public_url: String,
}

impl OAuthClients {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            meta: config.meta_oauth.clone(),
            linkedin: config.linkedin_oauth.clone(),
            google: config.google_oauth.clone(),
            public_url: config.public_url.clone(),
        }
    }

    #[must_use]
    pub fn for_platform(&self, platform: PlatformType) -> Option<&OAuthClientCredentials> {
        match platform {
            PlatformType::Facebook => self.meta.as_ref(),
            PlatformType::LinkedIn => self.linkedin.as_ref(),
            PlatformType::GoogleAnalytics => self.google.as_ref(),
        }
    }

    /// `<public_url>/api/v1/oauth/<platform>/callback`
    #[must_use]
    pub fn redirect_uri(&self, platform: PlatformType) -> String {
        format!(
            "{}/api/v1/oauth/{}/callback",
            self.public_url.trim_end_matches('/'),
            platform.as_str()
        )
    }
}

/// Static metadata for a supported platform.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformInfo {
    #[serde(rename = "type")]
    pub platform_type: PlatformType,
    pub name: &'static str,
    pub description: &'static str,
}

/// Builds the shared HTTP client used by every adapter.
///
/// # Errors
///
/// Returns [`IntegrationError::Http`] if the client cannot be constructed.
pub fn build_http_client(timeout_secs: u64) -> Result<Client, IntegrationError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent("pulseboard/0.1 (analytics-sync)")
        .build()?)
}

/// Random URL-safe nonce for the OAuth `state` parameter.
#[must_use]
pub fn generate_oauth_state() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(OAUTH_STATE_LEN)
        .map(char::from)
        .collect()
}

pub struct IntegrationFactory {
    clients: OAuthClients,
    http: Client,
    endpoints: PlatformEndpoints,
}

impl IntegrationFactory {
    #[must_use]
    pub fn new(clients: OAuthClients, http: Client) -> Self {
        Self::with_endpoints(clients, http, PlatformEndpoints::default())
    }

    /// Factory whose adapters talk to custom endpoints (for testing with
    /// wiremock).
    #[must_use]
    pub fn with_endpoints(clients: OAuthClients, http: Client, endpoints: PlatformEndpoints) -> Self {
        Self {
            clients,
            http,
            endpoints,
        }
    }

    #[must_use]
    pub fn platforms() -> Vec<PlatformInfo> {
        PlatformType::ALL
            .iter()
            .map(|&platform_type| PlatformInfo {
                platform_type,
                name: platform_type.display_name(),
                description: platform_type.description(),
            })
            .collect()
    }

    /// Instantiates the adapter for a storage key.
    ///
    /// # Errors
    ///
    /// - [`IntegrationError::UnsupportedPlatform`] for any key other than
    ///   `facebook`, `linkedin` or `google_analytics`.
    /// - [`IntegrationError::InvalidUrl`] if a configured endpoint is invalid.
    pub fn create_integration(
        &self,
        platform: &str,
        organization_id: Uuid,
        config: IntegrationConfig,
    ) -> Result<Box<dyn Integration>, IntegrationError> {
        let platform_type: PlatformType = platform
            .parse()
            .map_err(|_| IntegrationError::UnsupportedPlatform(platform.to_owned()))?;
        let credentials = self.clients.for_platform(platform_type).cloned();
        let http = self.http.clone();

        let integration: Box<dyn Integration> = match platform_type {
            PlatformType::Facebook => Box::new(MetaIntegration::with_endpoints(
                organization_id,
                config,
                credentials,
                http,
                &self.endpoints,
            )?),
            PlatformType::LinkedIn => Box::new(LinkedInIntegration::with_endpoints(
                organization_id,
                config,
                credentials,
                http,
                &self.endpoints,
            )?),
            PlatformType::GoogleAnalytics => Box::new(GoogleAnalyticsIntegration::with_endpoints(
                organization_id,
                config,
                credentials,
                http,
                &self.endpoints,
            )?),
        };
        Ok(integration)
    }

    /// Provider consent URL the user is redirected to.
    ///
    /// # Errors
    ///
    /// - [`IntegrationError::MissingClientCredentials`] if the platform has no
    ///   OAuth app configured.
    /// - [`IntegrationError::InvalidUrl`] if the authorize endpoint is invalid.
    pub fn authorization_url(
        &self,
        platform: PlatformType,
        state: &str,
    ) -> Result<Url, IntegrationError> {
        let credentials = self
            .clients
            .for_platform(platform)
            .ok_or(IntegrationError::MissingClientCredentials(platform))?;
        let (authorize, scopes) = match platform {
            PlatformType::Facebook => (&self.endpoints.meta_authorize, META_SCOPES),
            PlatformType::LinkedIn => (&self.endpoints.linkedin_authorize, LINKEDIN_SCOPES),
            PlatformType::GoogleAnalytics => (&self.endpoints.google_authorize, GOOGLE_SCOPES),
        };
        let mut url = Url::parse(authorize)
            .map_err(|e| IntegrationError::InvalidUrl(format!("'{authorize}': {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &credentials.client_id)
                .append_pair("redirect_uri", &self.clients.redirect_uri(platform))
                .append_pair("scope", scopes)
                .append_pair("state", state)
                .append_pair("response_type", "code");
            if platform == PlatformType::GoogleAnalytics {
                query
                    .append_pair("access_type", "offline")
                    .append_pair("prompt", "consent");
            }
        }
        Ok(url)
    }

    /// Exchanges an authorization code for the stream's initial credentials.
    ///
    /// Meta takes the code as GET query parameters; LinkedIn and Google take a
    /// form POST with `grant_type=authorization_code`.
    ///
    /// # Errors
    ///
    /// - [`IntegrationError::MissingClientCredentials`] if no OAuth app is
    ///   configured.
    /// - [`IntegrationError::TokenRefresh`] if the provider rejects the code.
    /// - [`IntegrationError::Http`] on network failure.
    pub async fn exchange_code(
        &self,
        platform: PlatformType,
        code: &str,
    ) -> Result<IntegrationConfig, IntegrationError> {
        let credentials = self
            .clients
            .for_platform(platform)
            .ok_or(IntegrationError::MissingClientCredentials(platform))?;
        let redirect_uri = self.clients.redirect_uri(platform);
        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("code", code),
        ];

        let request = match platform {
            PlatformType::Facebook => self.http.get(&self.endpoints.meta_token).query(&params),
            PlatformType::LinkedIn | PlatformType::GoogleAnalytics => {
                let token_url = if platform == PlatformType::LinkedIn {
                    &self.endpoints.linkedin_token
                } else {
                    &self.endpoints.google_token
                };
                let mut form = vec![("grant_type", "authorization_code")];
                form.extend_from_slice(&params);
                self.http.post(token_url).form(&form)
            }
        };

        let token = read_token_response(request.send().await?).await?;
        let mut config = token.into_config(None, Utc::now());
        // Meta issues no refresh token; the long-lived token itself is what
        // `fb_exchange_token` renews.
        if platform == PlatformType::Facebook && config.refresh_token.is_none() {
            config.refresh_token = Some(config.access_token.clone());
        }

        tracing::info!(platform = platform.as_str(), "authorization code exchanged");
        Ok(config)
    }
}
