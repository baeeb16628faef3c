use async_trait::async_trait;
use chrono::NaiveDate;
use pulseboard_core::{IntegrationConfig, IntegrationData, PlatformType};
use reqwest::{Method, Response, Url};
use serde_json::Value;
use uuid::Uuid;

use crate::error::IntegrationError;
use crate::session::OAuthSession;

/// One connected marketing platform for one organization.
///
/// Implementors supply identity, a connection probe and a single-day fetch;
/// token handling and the day-range loop are shared.
#[async_trait]
pub trait Integration: Send + Sync {
    fn platform_type(&self) -> PlatformType;

    /// Storage key, e.g. `"google_analytics"`.
    fn platform_name(&self) -> &'static str {
        self.platform_type().as_str()
    }

    fn organization_id(&self) -> Uuid;

    fn session(&self) -> &OAuthSession;

    fn session_mut(&mut self) -> &mut OAuthSession;

    fn config(&self) -> &IntegrationConfig {
        self.session().config()
    }

    /// Whether credentials were refreshed since construction and should be
    /// persisted.
    fn config_changed(&self) -> bool {
        self.session().config_changed()
    }

    /// Lightweight probe. `false` on any non-2xx response or transport error.
    async fn test_connection(&self) -> bool;

    /// # Errors
    ///
    /// See [`OAuthSession::refresh_token`].
    async fn refresh_token(&mut self) -> Result<IntegrationConfig, IntegrationError> {
        self.session_mut().refresh_token().await
    }

    /// # Errors
    ///
    /// See [`OAuthSession::make_authenticated_request`].
    async fn make_authenticated_request(
        &mut self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Response, IntegrationError> {
        self.session_mut()
            .make_authenticated_request(method, url, body)
            .await
    }

    /// Fetches and normalizes a single calendar day.
    ///
    /// # Errors
    ///
    /// Any upstream, decoding or missing-resource failure for that day.
    async fn fetch_day(&mut self, date: NaiveDate) -> Result<IntegrationData, IntegrationError>;

    /// Fetches every day in `[start, end]`, oldest first.
    ///
    /// Returns exactly one entry per day. A day that fails for any reason
    /// other than authentication is recorded as zero metrics with
    /// `raw_data.error` set.
    ///
    /// # Errors
    ///
    /// Returns the first authentication error ([`IntegrationError::is_auth`]);
    /// the remaining days are not attempted.
    async fn fetch_data(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<IntegrationData>, IntegrationError> {
        let mut out = Vec::new();
        for date in days_inclusive(start, end) {
            match self.fetch_day(date).await {
                Ok(data) => out.push(data),
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        platform = self.platform_name(),
                        organization_id = %self.organization_id(),
                        %date,
                        error = %e,
                        "day fetch failed; recording zero metrics"
                    );
                    out.push(IntegrationData::failed(date, &e));
                }
            }
        }
        Ok(out)
    }
}

/// Calendar days from `start` through `end`; empty when `start > end`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}
