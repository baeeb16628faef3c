//! Meta (Facebook Pages + Instagram Business) via the Graph API.
//!
//! Resolution chain per connection: user token → first managed page (and its
//! page token) → optional linked Instagram business account. The chain is
//! resolved lazily on the first fetched day and reused for the rest of the
//! range.

use async_trait::async_trait;
use chrono::NaiveDate;
use pulseboard_core::{
    IntegrationConfig, IntegrationData, OAuthClientCredentials, PlatformMetrics, PlatformType,
};
use reqwest::{Client, Url};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{as_count, PlatformEndpoints};
use crate::error::IntegrationError;
use crate::integration::Integration;
use crate::session::{endpoint, parse_base_url, OAuthSession, RefreshGrant, TokenEndpoint};

const PAGE_METRICS: &str =
    "page_impressions,page_impressions_unique,page_post_engagements,page_total_actions,page_fans";
const INSTAGRAM_METRICS: &str = "impressions,reach,follower_count";

#[derive(Debug, Clone)]
struct FacebookPage {
    id: String,
    access_token: String,
    instagram_id: Option<String>,
}

pub struct MetaIntegration {
    organization_id: Uuid,
    session: OAuthSession,
    graph: Url,
    page: Option<FacebookPage>,
}

impl MetaIntegration {
    /// Adapter against the production Graph API.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::InvalidUrl`] if an endpoint fails to parse.
    pub fn new(
        organization_id: Uuid,
        config: IntegrationConfig,
        credentials: Option<OAuthClientCredentials>,
        http: Client,
    ) -> Result<Self, IntegrationError> {
        Self::with_endpoints(
            organization_id,
            config,
            credentials,
            http,
            &PlatformEndpoints::default(),
        )
    }

    /// Adapter against custom endpoints (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::InvalidUrl`] if an endpoint fails to parse.
    pub fn with_endpoints(
        organization_id: Uuid,
        config: IntegrationConfig,
        credentials: Option<OAuthClientCredentials>,
        http: Client,
        endpoints: &PlatformEndpoints,
    ) -> Result<Self, IntegrationError> {
        let token_url = Url::parse(&endpoints.meta_token)
            .map_err(|e| IntegrationError::InvalidUrl(format!("'{}': {e}", endpoints.meta_token)))?;
        let session = OAuthSession::new(
            http,
            config,
            TokenEndpoint {
                url: token_url,
                credentials,
                grant: RefreshGrant::FacebookExchange,
            },
        );
        Ok(Self {
            organization_id,
            session,
            graph: parse_base_url(&endpoints.meta_graph)?,
            page: None,
        })
    }

    async fn resolve_page(&mut self) -> Result<FacebookPage, IntegrationError> {
        if let Some(page) = &self.page {
            return Ok(page.clone());
        }

        let accounts = self
            .session
            .get_json(endpoint(&self.graph, "me/accounts")?)
            .await?;
        let first = accounts
            .get("data")
            .and_then(Value::as_array)
            .and_then(|pages| pages.first())
            .ok_or_else(|| IntegrationError::MissingResource("no Facebook page found".into()))?;
        let (Some(id), Some(access_token)) = (
            first.get("id").and_then(Value::as_str),
            first.get("access_token").and_then(Value::as_str),
        ) else {
            return Err(IntegrationError::MissingResource(
                "Facebook page is missing id or access token".into(),
            ));
        };

        let instagram_id = self.resolve_instagram(id, access_token).await;
        let page = FacebookPage {
            id: id.to_owned(),
            access_token: access_token.to_owned(),
            instagram_id,
        };
        tracing::debug!(
            organization_id = %self.organization_id,
            page_id = %page.id,
            has_instagram = page.instagram_id.is_some(),
            "resolved Facebook page"
        );
        self.page = Some(page.clone());
        Ok(page)
    }

    async fn resolve_instagram(&self, page_id: &str, page_token: &str) -> Option<String> {
        let mut url = endpoint(&self.graph, page_id).ok()?;
        url.query_pairs_mut()
            .append_pair("fields", "instagram_business_account");
        match self.session.get_json_with_token(url, page_token).await {
            Ok(body) => body
                .get("instagram_business_account")
                .and_then(|ig| ig.get("id"))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
            Err(e) => {
                tracing::warn!(page_id, error = %e, "Instagram account lookup failed");
                None
            }
        }
    }

    fn insights_url(
        &self,
        object_id: &str,
        metrics: &str,
        date: NaiveDate,
    ) -> Result<Url, IntegrationError> {
        let mut url = endpoint(&self.graph, &format!("{object_id}/insights"))?;
        let until = date.succ_opt().unwrap_or(date);
        url.query_pairs_mut()
            .append_pair("metric", metrics)
            .append_pair("period", "day")
            .append_pair("since", &date.to_string())
            .append_pair("until", &until.to_string());
        Ok(url)
    }
}

/// First value of the named metric in a Graph insights response.
fn insight_value(insights: &Value, name: &str) -> i64 {
    let value = insights
        .get("data")
        .and_then(Value::as_array)
        .and_then(|series| {
            series
                .iter()
                .find(|s| s.get("name").and_then(Value::as_str) == Some(name))
        })
        .and_then(|s| s.get("values"))
        .and_then(Value::as_array)
        .and_then(|values| values.first())
        .and_then(|v| v.get("value"));
    as_count(value)
}

#[async_trait]
impl Integration for MetaIntegration {
    fn platform_type(&self) -> PlatformType {
        PlatformType::Facebook
    }

    fn organization_id(&self) -> Uuid {
        self.organization_id
    }

    fn session(&self) -> &OAuthSession {
        &self.session
    }

    fn session_mut(&mut self) -> &mut OAuthSession {
        &mut self.session
    }

    async fn test_connection(&self) -> bool {
        match endpoint(&self.graph, "me") {
            Ok(url) => self.session.probe(url).await,
            Err(_) => false,
        }
    }

    async fn fetch_day(&mut self, date: NaiveDate) -> Result<IntegrationData, IntegrationError> {
        let page = self.resolve_page().await?;

        let page_insights = self
            .session
            .get_json_with_token(
                self.insights_url(&page.id, PAGE_METRICS, date)?,
                &page.access_token,
            )
            .await?;

        let mut metrics = PlatformMetrics {
            impressions: insight_value(&page_insights, "page_impressions"),
            reach: insight_value(&page_insights, "page_impressions_unique"),
            engagement: insight_value(&page_insights, "page_post_engagements"),
            clicks: insight_value(&page_insights, "page_total_actions"),
            conversions: 0,
            followers: Some(insight_value(&page_insights, "page_fans")),
            ..PlatformMetrics::zero()
        };

        let mut instagram_insights = Value::Null;
        if let Some(ig_id) = &page.instagram_id {
            let url = self.insights_url(ig_id, INSTAGRAM_METRICS, date)?;
            match self
                .session
                .get_json_with_token(url, &page.access_token)
                .await
            {
                Ok(body) => {
                    metrics.extra.insert(
                        "instagram_impressions".to_owned(),
                        json!(insight_value(&body, "impressions")),
                    );
                    metrics.extra.insert(
                        "instagram_reach".to_owned(),
                        json!(insight_value(&body, "reach")),
                    );
                    metrics.extra.insert(
                        "instagram_followers".to_owned(),
                        json!(insight_value(&body, "follower_count")),
                    );
                    instagram_insights = body;
                }
                Err(e) => {
                    tracing::warn!(
                        organization_id = %self.organization_id,
                        instagram_id = %ig_id,
                        %date,
                        error = %e,
                        "Instagram insights fetch failed; continuing with page metrics"
                    );
                }
            }
        }

        Ok(IntegrationData {
            date,
            metrics,
            raw_data: json!({
                "page_id": page.id,
                "page_insights": page_insights,
                "instagram_insights": instagram_insights,
            }),
        })
    }
}
