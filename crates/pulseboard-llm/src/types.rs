//! Request, response and parsed-output shapes for the LLM layer.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// One generation request. Stateless: one request yields one response.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Overrides the provider's default model.
    pub model: Option<String>,
    /// Ask the provider for structured JSON output where it supports it.
    pub json_output: bool,
}

impl LlmRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            model: None,
            json_output: false,
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<TokenUsage>,
    pub model: String,
    pub provider: String,
}

/// One post idea, as the model is asked to emit it. Missing or oddly typed
/// fields fall back to empty values rather than failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSuggestion {
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub content: String,
    #[serde(deserialize_with = "lenient_string")]
    pub platform: String,
    #[serde(deserialize_with = "lenient_string")]
    pub content_type: String,
    #[serde(deserialize_with = "lenient_strings")]
    pub hashtags: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub best_time_to_post: String,
    #[serde(deserialize_with = "lenient_string")]
    pub expected_engagement: String,
    #[serde(deserialize_with = "lenient_string")]
    pub rationale: String,
}

pub const INSIGHT_PARSE_FAILURE: &str = "Unable to parse insights from AI response";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsInsight {
    #[serde(deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(deserialize_with = "lenient_strings")]
    pub key_findings: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub recommendations: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub trends: Vec<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub opportunities: Vec<String>,
}

impl AnalyticsInsight {
    /// Returned whenever the model output cannot be turned into an insight.
    #[must_use]
    pub fn unparseable() -> Self {
        Self {
            summary: INSIGHT_PARSE_FAILURE.to_owned(),
            ..Self::default()
        }
    }

    /// True when no field carries any content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summary.trim().is_empty()
            && self.key_findings.is_empty()
            && self.recommendations.is_empty()
            && self.trends.is_empty()
            && self.opportunities.is_empty()
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_string(Value::deserialize(deserializer)?))
}

/// Accepts a list of anything (objects are rendered as JSON), a single
/// comma/space separated string, or null.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .map(value_to_string)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split([',', ' '])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
        other => vec![other.to_string()],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_builder_sets_fields() {
        let request = LlmRequest::new("hello")
            .with_system("be brief")
            .with_temperature(0.2)
            .with_max_tokens(50)
            .with_model("m")
            .with_json_output();
        assert_eq!(request.prompt, "hello");
        assert_eq!(request.system.as_deref(), Some("be brief"));
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, 50);
        assert_eq!(request.model.as_deref(), Some("m"));
        assert!(request.json_output);
    }

    #[test]
    fn suggestion_tolerates_missing_and_mistyped_fields() {
        let suggestion: ContentSuggestion = serde_json::from_value(json!({
            "title": "Launch teaser",
            "hashtags": "#launch, #ai",
            "expected_engagement": 4.5,
            "unexpected": true
        }))
        .unwrap();
        assert_eq!(suggestion.title, "Launch teaser");
        assert_eq!(suggestion.hashtags, vec!["#launch", "#ai"]);
        assert_eq!(suggestion.expected_engagement, "4.5");
        assert!(suggestion.content.is_empty());
    }

    #[test]
    fn insight_lists_accept_objects() {
        let insight: AnalyticsInsight = serde_json::from_value(json!({
            "summary": "Up and to the right",
            "key_findings": ["reach grew", {"metric": "clicks"}],
            "trends": null
        }))
        .unwrap();
        assert_eq!(insight.key_findings.len(), 2);
        assert_eq!(insight.key_findings[1], r#"{"metric":"clicks"}"#);
        assert!(insight.trends.is_empty());
    }

    #[test]
    fn insight_is_empty_only_without_content() {
        assert!(AnalyticsInsight::default().is_empty());
        assert!(!AnalyticsInsight::unparseable().is_empty());
        let trends_only = AnalyticsInsight {
            trends: vec!["weekend dip".to_owned()],
            ..AnalyticsInsight::default()
        };
        assert!(!trends_only.is_empty());
    }

    #[test]
    fn unparseable_insight_has_fixed_summary() {
        let insight = AnalyticsInsight::unparseable();
        assert_eq!(insight.summary, "Unable to parse insights from AI response");
        assert!(insight.key_findings.is_empty());
        assert!(insight.recommendations.is_empty());
    }
}
