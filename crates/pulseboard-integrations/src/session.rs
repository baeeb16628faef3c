//! Token lifecycle and authenticated HTTP shared by every platform adapter.
//!
//! [`OAuthSession`] owns the current [`IntegrationConfig`] for one data
//! stream. Requests carry the access token as a bearer header; a `401`
//! triggers exactly one refresh-and-retry when a refresh token is stored.

use chrono::{DateTime, Utc};
use pulseboard_core::{IntegrationConfig, OAuthClientCredentials};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::error::IntegrationError;

/// How a provider expects a refresh to be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshGrant {
    /// RFC 6749 `grant_type=refresh_token` form POST (LinkedIn, Google).
    RefreshToken,
    /// Graph API long-lived token exchange via GET (Meta).
    FacebookExchange,
}

/// Where and how to refresh tokens for one provider.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    pub url: Url,
    pub credentials: Option<OAuthClientCredentials>,
    pub grant: RefreshGrant,
}

/// Token endpoint response shared by all three providers.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Builds the next config, keeping the previous refresh token, scopes
    /// and platform extras when the provider does not send new ones.
    pub(crate) fn into_config(
        self,
        previous: Option<&IntegrationConfig>,
        now: DateTime<Utc>,
    ) -> IntegrationConfig {
        let scope = self
            .scope
            .map(|raw| {
                raw.split([' ', ','])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToOwned::to_owned)
                    .collect::<Vec<_>>()
            })
            .or_else(|| previous.and_then(|p| p.scope.clone()));

        IntegrationConfig {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous.and_then(|p| p.refresh_token.clone())),
            expires_at: self.expires_in.map(|secs| now.timestamp() + secs),
            scope,
            extra: previous.map(|p| p.extra.clone()).unwrap_or_default(),
        }
    }
}

/// Parses a token endpoint body into [`TokenResponse`].
pub(crate) async fn read_token_response(
    response: Response,
) -> Result<TokenResponse, IntegrationError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(IntegrationError::TokenRefresh(format!(
            "token endpoint returned {status}: {}",
            truncate(&body, 200)
        )));
    }
    serde_json::from_str(&body)
        .map_err(|e| IntegrationError::TokenRefresh(format!("unparseable token response: {e}")))
}

/// Authenticated HTTP session for one data stream.
#[derive(Debug)]
pub struct OAuthSession {
    client: Client,
    config: IntegrationConfig,
    token_endpoint: TokenEndpoint,
    refreshed: bool,
}

impl OAuthSession {
    #[must_use]
    pub fn new(client: Client, config: IntegrationConfig, token_endpoint: TokenEndpoint) -> Self {
        Self {
            client,
            config,
            token_endpoint,
            refreshed: false,
        }
    }

    #[must_use]
    pub fn config(&self) -> &IntegrationConfig {
        &self.config
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// `true` once a refresh has replaced the config this session started with.
    #[must_use]
    pub fn config_changed(&self) -> bool {
        self.refreshed
    }

    /// Exchanges the stored refresh token for a new access token.
    ///
    /// Replaces the in-memory config and returns a copy of it. No retry is
    /// attempted.
    ///
    /// # Errors
    ///
    /// - [`IntegrationError::MissingRefreshToken`] if none is stored.
    /// - [`IntegrationError::TokenRefresh`] if client credentials are not
    ///   configured or the endpoint rejects the exchange.
    /// - [`IntegrationError::Http`] on network failure.
    pub async fn refresh_token(&mut self) -> Result<IntegrationConfig, IntegrationError> {
        let refresh_token = self
            .config
            .refresh_token
            .clone()
            .ok_or(IntegrationError::MissingRefreshToken)?;
        let credentials = self.token_endpoint.credentials.as_ref().ok_or_else(|| {
            IntegrationError::TokenRefresh("OAuth client credentials are not configured".into())
        })?;

        let request = match self.token_endpoint.grant {
            RefreshGrant::RefreshToken => self.client.post(self.token_endpoint.url.clone()).form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ]),
            RefreshGrant::FacebookExchange => {
                self.client.get(self.token_endpoint.url.clone()).query(&[
                    ("grant_type", "fb_exchange_token"),
                    ("client_id", credentials.client_id.as_str()),
                    ("client_secret", credentials.client_secret.as_str()),
                    ("fb_exchange_token", refresh_token.as_str()),
                ])
            }
        };

        let token = read_token_response(request.send().await?).await?;
        let mut next = token.into_config(Some(&self.config), Utc::now());
        if self.token_endpoint.grant == RefreshGrant::FacebookExchange {
            // Graph issues no refresh token; the new long-lived token is the
            // input to the next exchange.
            next.refresh_token = Some(next.access_token.clone());
        }
        self.config = next;
        self.refreshed = true;
        tracing::info!(
            token_url = %self.token_endpoint.url,
            "access token refreshed"
        );
        Ok(self.config.clone())
    }

    /// Sends a request with the current bearer token.
    ///
    /// A token already past its recorded expiry is refreshed before sending.
    /// Otherwise a `401` triggers one [`refresh_token`](Self::refresh_token)
    /// and one retry using the new token. At most one refresh happens per
    /// call. Any other status is returned to the caller unchanged.
    ///
    /// # Errors
    ///
    /// - [`IntegrationError::Unauthorized`] on a `401` with no refresh token,
    ///   or a second `401` after refreshing.
    /// - Refresh errors are propagated as-is.
    /// - [`IntegrationError::Http`] on network failure.
    pub async fn make_authenticated_request(
        &mut self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Response, IntegrationError> {
        let expired = self.config.refresh_token.is_some() && self.config.is_expired(Utc::now());
        if expired {
            tracing::debug!(url = %url, "stored token expired; refreshing before request");
            self.refresh_token().await?;
        }

        let response = self.send_once(method.clone(), url.clone(), body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if expired || self.config.refresh_token.is_none() {
            return Err(IntegrationError::Unauthorized {
                url: url.to_string(),
            });
        }

        tracing::debug!(url = %url, "401 from provider; refreshing token and retrying once");
        self.refresh_token().await?;

        let retry = self.send_once(method, url.clone(), body).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            return Err(IntegrationError::Unauthorized {
                url: url.to_string(),
            });
        }
        Ok(retry)
    }

    /// Authenticated GET that asserts a 2xx status and decodes JSON.
    ///
    /// # Errors
    ///
    /// See [`make_authenticated_request`](Self::make_authenticated_request);
    /// additionally [`IntegrationError::UnexpectedStatus`] and
    /// [`IntegrationError::Deserialize`].
    pub async fn get_json(&mut self, url: Url) -> Result<Value, IntegrationError> {
        let response = self
            .make_authenticated_request(Method::GET, url.clone(), None)
            .await?;
        decode_json(response, &url).await
    }

    /// Authenticated POST of a JSON body; asserts 2xx and decodes JSON.
    ///
    /// # Errors
    ///
    /// Same as [`get_json`](Self::get_json).
    pub async fn post_json(&mut self, url: Url, body: &Value) -> Result<Value, IntegrationError> {
        let response = self
            .make_authenticated_request(Method::POST, url.clone(), Some(body))
            .await?;
        decode_json(response, &url).await
    }

    /// GET with a caller-supplied token (e.g. a Facebook page token derived
    /// from the user token). No refresh is attempted.
    ///
    /// # Errors
    ///
    /// [`IntegrationError::Unauthorized`] on `401`, otherwise as
    /// [`get_json`](Self::get_json).
    pub async fn get_json_with_token(
        &self,
        url: Url,
        token: &str,
    ) -> Result<Value, IntegrationError> {
        let response = self.client.get(url.clone()).bearer_auth(token).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(IntegrationError::Unauthorized {
                url: url.to_string(),
            });
        }
        decode_json(response, &url).await
    }

    /// Single GET with the current token: `true` only on a 2xx status.
    /// Never refreshes or retries.
    pub async fn probe(&self, url: Url) -> bool {
        match self
            .client
            .get(url.clone())
            .bearer_auth(&self.config.access_token)
            .send()
            .await
        {
            Ok(response) => {
                let ok = response.status().is_success();
                if !ok {
                    tracing::debug!(url = %url, status = %response.status(), "connection probe failed");
                }
                ok
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "connection probe errored");
                false
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Response, IntegrationError> {
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.config.access_token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }
}

async fn decode_json(response: Response, url: &Url) -> Result<Value, IntegrationError> {
    let status = response.status();
    if !status.is_success() {
        return Err(IntegrationError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| IntegrationError::Deserialize {
        context: url.to_string(),
        source: e,
    })
}

/// Parses a base URL and normalises it to end with exactly one slash so that
/// [`endpoint`] joins relative paths beneath it.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, IntegrationError> {
    let normalised = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| IntegrationError::InvalidUrl(format!("'{raw}': {e}")))
}

pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, IntegrationError> {
    base.join(path.trim_start_matches('/'))
        .map_err(|e| IntegrationError::InvalidUrl(format!("'{base}' + '{path}': {e}")))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
