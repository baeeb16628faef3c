//! Platform adapters and the upstream URLs they talk to.

pub mod google_analytics;
pub mod linkedin;
pub mod meta;

use serde_json::Value;

pub use google_analytics::GoogleAnalyticsIntegration;
pub use linkedin::LinkedInIntegration;
pub use meta::MetaIntegration;

/// Every upstream URL used by the adapters and the factory.
///
/// [`Default`] points at production. Tests use [`PlatformEndpoints::all_at`]
/// to route everything to one mock server.
#[derive(Debug, Clone)]
pub struct PlatformEndpoints {
    pub meta_graph: String,
    pub meta_authorize: String,
    pub meta_token: String,
    pub linkedin_api: String,
    pub linkedin_authorize: String,
    pub linkedin_token: String,
    pub google_admin: String,
    pub google_data: String,
    pub google_authorize: String,
    pub google_token: String,
}

impl Default for PlatformEndpoints {
    fn default() -> Self {
        Self {
            meta_graph: "https://graph.facebook.com/v18.0".to_owned(),
            meta_authorize: "https://www.facebook.com/v18.0/dialog/oauth".to_owned(),
            meta_token: "https://graph.facebook.com/v18.0/oauth/access_token".to_owned(),
            linkedin_api: "https://api.linkedin.com".to_owned(),
            linkedin_authorize: "https://www.linkedin.com/oauth/v2/authorization".to_owned(),
            linkedin_token: "https://www.linkedin.com/oauth/v2/accessToken".to_owned(),
            google_admin: "https://analyticsadmin.googleapis.com".to_owned(),
            google_data: "https://analyticsdata.googleapis.com".to_owned(),
            google_authorize: "https://accounts.google.com/o/oauth2/v2/auth".to_owned(),
            google_token: "https://oauth2.googleapis.com/token".to_owned(),
        }
    }
}

impl PlatformEndpoints {
    /// All APIs served from `base`, with token and authorize endpoints at
    /// fixed sub-paths.
    #[must_use]
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            meta_graph: base.to_owned(),
            meta_authorize: format!("{base}/dialog/oauth"),
            meta_token: format!("{base}/oauth/access_token"),
            linkedin_api: base.to_owned(),
            linkedin_authorize: format!("{base}/oauth/v2/authorization"),
            linkedin_token: format!("{base}/oauth/v2/accessToken"),
            google_admin: base.to_owned(),
            google_data: base.to_owned(),
            google_authorize: format!("{base}/o/oauth2/v2/auth"),
            google_token: format!("{base}/token"),
        }
    }
}

/// Reads an integer that providers send either as a JSON number or a
/// numeric string. Anything else counts as zero.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn as_count(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s
            .parse::<i64>()
            .ok()
            .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
            .unwrap_or(0),
        _ => 0,
    }
}
