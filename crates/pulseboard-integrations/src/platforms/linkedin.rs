//! LinkedIn company pages via the Marketing API v2.

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

pub struct LinkedInIntegration {
    organization_id: Uuid,
    session: OAuthSession,
    api: Url,
    organization_urn: Option<String>,
}

impl LinkedInIntegration {
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
        let token_url = Url::parse(&endpoints.linkedin_token).map_err(|e| {
            IntegrationError::InvalidUrl(format!("'{}': {e}", endpoints.linkedin_token))
        })?;
        let session = OAuthSession::new(
            http,
            config,
            TokenEndpoint {
                url: token_url,
                credentials,
                grant: RefreshGrant::RefreshToken,
            },
        );
        Ok(Self {
            organization_id,
            session,
            api: parse_base_url(&endpoints.linkedin_api)?,
            organization_urn: None,
        })
    }

    async fn resolve_organization(&mut self) -> Result<String, IntegrationError> {
        if let Some(urn) = &self.organization_urn {
            return Ok(urn.clone());
        }

        let mut url = endpoint(&self.api, "v2/organizationAcls")?;
        url.query_pairs_mut()
            .append_pair("q", "roleAssignee")
            .append_pair("role", "ADMINISTRATOR");
        let acls = self.session.get_json(url).await?;

        let urn = acls
            .get("elements")
            .and_then(Value::as_array)
            .and_then(|elements| elements.first())
            .and_then(|acl| acl.get("organization"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                IntegrationError::MissingResource("no administered LinkedIn organization".into())
            })?
            .to_owned();

        tracing::debug!(
            organization_id = %self.organization_id,
            linkedin_organization = %urn,
            "resolved LinkedIn organization"
        );
        self.organization_urn = Some(urn.clone());
        Ok(urn)
    }

    async fn follower_count(&mut self, urn: &str) -> (Option<i64>, Value) {
        let url = match endpoint(&self.api, &format!("v2/networkSizes/{}", encode_urn(urn))) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .append_pair("edgeType", "CompanyFollowedByMember");
                url
            }
            Err(e) => return (None, json!({"error": e.to_string()})),
        };
        match self.session.get_json(url).await {
            Ok(body) => (
                body.get("firstDegreeSize").map(|v| as_count(Some(v))),
                body,
            ),
            Err(e) => {
                tracing::warn!(
                    organization_id = %self.organization_id,
                    linkedin_organization = %urn,
                    error = %e,
                    "LinkedIn follower count unavailable"
                );
                (None, json!({"error": e.to_string()}))
            }
        }
    }
}

/// URNs contain colons, which LinkedIn expects percent-encoded in path
/// segments.
fn encode_urn(urn: &str) -> String {
    urn.replace(':', "%3A")
}

fn day_bounds_millis(date: NaiveDate) -> (i64, i64) {
    let start = date
        .and_hms_opt(0, 0, 0)
        .map_or(0, |dt| dt.and_utc().timestamp_millis());
    (start, start + 86_400_000)
}

/// Sums `totalShareStatistics` across every returned element.
fn sum_share_statistics(body: &Value) -> PlatformMetrics {
    let mut metrics = PlatformMetrics::zero();
    let elements = body
        .get("elements")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for element in elements {
        let Some(stats) = element.get("totalShareStatistics") else {
            continue;
        };
        metrics.impressions += as_count(stats.get("impressionCount"));
        metrics.reach += as_count(stats.get("uniqueImpressionsCount"));
        metrics.engagement += as_count(stats.get("likeCount"))
            + as_count(stats.get("commentCount"))
            + as_count(stats.get("shareCount"));
        metrics.clicks += as_count(stats.get("clickCount"));
    }
    metrics
}

#[allow(clippy::cast_precision_loss)]
fn engagement_rate(metrics: &PlatformMetrics) -> f64 {
    if metrics.impressions == 0 {
        0.0
    } else {
        (metrics.engagement + metrics.clicks) as f64 / metrics.impressions as f64
    }
}

#[async_trait]
impl Integration for LinkedInIntegration {
    fn platform_type(&self) -> PlatformType {
        PlatformType::LinkedIn
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
        match endpoint(&self.api, "v2/me") {
            Ok(url) => self.session.probe(url).await,
            Err(_) => false,
        }
    }

    async fn fetch_day(&mut self, date: NaiveDate) -> Result<IntegrationData, IntegrationError> {
        let urn = self.resolve_organization().await?;
        let (start_ms, end_ms) = day_bounds_millis(date);

        let mut url = endpoint(&self.api, "v2/organizationalEntityShareStatistics")?;
        url.query_pairs_mut()
            .append_pair("q", "organizationalEntity")
            .append_pair("organizationalEntity", &urn)
            .append_pair("timeIntervals.timeGranularityType", "DAY")
            .append_pair("timeIntervals.timeRange.start", &start_ms.to_string())
            .append_pair("timeIntervals.timeRange.end", &end_ms.to_string());
        let share_stats = self.session.get_json(url).await?;

        let mut metrics = sum_share_statistics(&share_stats);
        let (followers, follower_raw) = self.follower_count(&urn).await;
        metrics.followers = followers;
        metrics.extra.insert(
            "engagement_rate".to_owned(),
            json!(engagement_rate(&metrics)),
        );

        Ok(IntegrationData {
            date,
            metrics,
            raw_data: json!({
                "organization": urn,
                "share_statistics": share_stats,
                "network_size": follower_raw,
            }),
        })
    }
}
