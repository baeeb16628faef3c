//! Platform identities and data-stream lifecycle states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// External platforms a data stream can connect to.
///
/// The serialized form is the storage key written to
/// `data_streams.platform_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformType {
    Facebook,
    #[serde(rename = "linkedin")]
    LinkedIn,
    GoogleAnalytics,
}

impl PlatformType {
    pub const ALL: [PlatformType; 3] = [
        PlatformType::Facebook,
        PlatformType::LinkedIn,
        PlatformType::GoogleAnalytics,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformType::Facebook => "facebook",
            PlatformType::LinkedIn => "linkedin",
            PlatformType::GoogleAnalytics => "google_analytics",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            PlatformType::Facebook => "Meta (Facebook & Instagram)",
            PlatformType::LinkedIn => "LinkedIn",
            PlatformType::GoogleAnalytics => "Google Analytics",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            PlatformType::Facebook => {
                "Page and Instagram business account insights: impressions, reach, engagement and followers"
            }
            PlatformType::LinkedIn => {
                "Company page share statistics: impressions, clicks, engagement and follower counts"
            }
            PlatformType::GoogleAnalytics => {
                "Website traffic from GA4 properties: sessions, users, engagement and conversions"
            }
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "facebook" => Ok(PlatformType::Facebook),
            "linkedin" => Ok(PlatformType::LinkedIn),
            "google_analytics" => Ok(PlatformType::GoogleAnalytics),
            other => Err(ConfigError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// Sync status of a `data_streams` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Pending,
    Active,
    Error,
    Disconnected,
}

impl StreamStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StreamStatus::Pending => "pending",
            StreamStatus::Active => "active",
            StreamStatus::Error => "error",
            StreamStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamStatus {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StreamStatus::Pending),
            "active" => Ok(StreamStatus::Active),
            "error" => Ok(StreamStatus::Error),
            "disconnected" => Ok(StreamStatus::Disconnected),
            other => Err(ConfigError::UnknownStreamStatus(other.to_string())),
        }
    }
}
