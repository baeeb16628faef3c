//! Value shapes exchanged between platform adapters, the sync orchestrator
//! and storage.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest span, counted as the difference between first and last day, a
/// single sync or analytics query may cover.
pub const MAX_SYNC_RANGE_DAYS: i64 = 366;

/// Credentials for one data stream, stored as opaque JSON in
/// `data_streams.config`.
///
/// Platform-specific fields (page IDs, property IDs, ...) ride along in
/// `extra` and survive a round trip through the database untouched.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as Unix epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IntegrationConfig {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            scope: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Returns `true` when an expiry is known and has passed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now.timestamp())
    }

    /// Reads a string field from the platform-specific extras.
    #[must_use]
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

impl std::fmt::Debug for IntegrationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationConfig")
            .field("access_token", &"[redacted]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[redacted]"),
            )
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Normalized numeric facts for one platform and one day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformMetrics {
    pub impressions: i64,
    pub reach: i64,
    pub engagement: i64,
    pub clicks: i64,
    pub conversions: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<i64>,
    /// Platform-specific extension fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PlatformMetrics {
    /// All-zero metrics, used whenever an upstream fetch fails.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.impressions == 0
            && self.reach == 0
            && self.engagement == 0
            && self.clicks == 0
            && self.conversions == 0
            && self.followers.unwrap_or(0) == 0
    }
}

/// One row of synced data: a single calendar day for a single stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationData {
    pub date: NaiveDate,
    pub metrics: PlatformMetrics,
    /// The unnormalized provider response(s), kept for auditing.
    pub raw_data: Value,
}

impl IntegrationData {
    /// Zero-filled entry for a day whose upstream fetch failed.
    ///
    /// `raw_data.error` always carries a non-empty message.
    #[must_use]
    pub fn failed(date: NaiveDate, error: impl std::fmt::Display) -> Self {
        let mut message = error.to_string();
        if message.trim().is_empty() {
            message = "unknown error".to_string();
        }
        Self {
            date,
            metrics: PlatformMetrics::zero(),
            raw_data: serde_json::json!({ "error": message }),
        }
    }

    /// Returns the `raw_data.error` message for failed days.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.raw_data.get("error").and_then(Value::as_str)
    }
}
