//! Google Analytics 4 via the Admin API (property discovery) and the Data
//! API (daily reports).

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

/// Report metrics, in the order they come back in `metricValues`.
const REPORT_METRICS: [&str; 6] = [
    "sessions",
    "totalUsers",
    "engagedSessions",
    "screenPageViews",
    "conversions",
    "newUsers",
];

pub struct GoogleAnalyticsIntegration {
    organization_id: Uuid,
    session: OAuthSession,
    admin: Url,
    data: Url,
    property: Option<String>,
}

impl GoogleAnalyticsIntegration {
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

    /// A `property_id` stored in the config extras (`"123"` or
    /// `"properties/123"`) skips account discovery.
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
        let property = config.extra_str("property_id").map(normalize_property);
        let token_url = Url::parse(&endpoints.google_token).map_err(|e| {
            IntegrationError::InvalidUrl(format!("'{}': {e}", endpoints.google_token))
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
            admin: parse_base_url(&endpoints.google_admin)?,
            data: parse_base_url(&endpoints.google_data)?,
            property,
        })
    }

    async fn resolve_property(&mut self) -> Result<String, IntegrationError> {
        if let Some(property) = &self.property {
            return Ok(property.clone());
        }

        let summaries = self
            .session
            .get_json(endpoint(&self.admin, "v1beta/accountSummaries")?)
            .await?;
        let account = summaries
            .get("accountSummaries")
            .and_then(Value::as_array)
            .and_then(|accounts| accounts.first())
            .ok_or_else(|| {
                IntegrationError::MissingResource("no Google Analytics account".into())
            })?;
        let property = account
            .get("propertySummaries")
            .and_then(Value::as_array)
            .and_then(|properties| properties.first())
            .and_then(|p| p.get("property"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                IntegrationError::MissingResource("no Google Analytics property".into())
            })?
            .to_owned();

        tracing::debug!(
            organization_id = %self.organization_id,
            %property,
            "resolved Google Analytics property"
        );
        self.property = Some(property.clone());
        Ok(property)
    }
}

fn normalize_property(raw: &str) -> String {
    if raw.starts_with("properties/") {
        raw.to_owned()
    } else {
        format!("properties/{raw}")
    }
}

fn report_request(date: NaiveDate) -> Value {
    let day = date.to_string();
    json!({
        "dateRanges": [{"startDate": day, "endDate": day}],
        "metrics": REPORT_METRICS.iter().map(|name| json!({"name": name})).collect::<Vec<_>>(),
    })
}

/// Maps the first report row onto metrics. A report with no rows is a
/// legitimate zero day.
fn map_report(report: &Value) -> PlatformMetrics {
    let values: Vec<i64> = report
        .get("rows")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(|row| row.get("metricValues"))
        .and_then(Value::as_array)
        .map(|cells| cells.iter().map(|c| as_count(c.get("value"))).collect())
        .unwrap_or_default();
    let at = |i: usize| values.get(i).copied().unwrap_or(0);

    let mut metrics = PlatformMetrics {
        impressions: at(0),
        reach: at(1),
        engagement: at(2),
        clicks: at(3),
        conversions: at(4),
        followers: None,
        ..PlatformMetrics::zero()
    };
    metrics.extra.insert("new_users".to_owned(), json!(at(5)));
    metrics
}

#[async_trait]
impl Integration for GoogleAnalyticsIntegration {
    fn platform_type(&self) -> PlatformType {
        PlatformType::GoogleAnalytics
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
        match endpoint(&self.admin, "v1beta/accountSummaries") {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("pageSize", "1");
                self.session.probe(url).await
            }
            Err(_) => false,
        }
    }

    async fn fetch_day(&mut self, date: NaiveDate) -> Result<IntegrationData, IntegrationError> {
        let property = self.resolve_property().await?;
        let url = endpoint(&self.data, &format!("v1beta/{property}:runReport"))?;
        let report = self.session.post_json(url, &report_request(date)).await?;

        Ok(IntegrationData {
            date,
            metrics: map_report(&report),
            raw_data: json!({
                "property": property,
                "report": report,
            }),
        })
    }
}
