//! Fixed prompt templates for the two built-in use cases.

use serde_json::Value;

pub const CONTENT_SYSTEM_PROMPT: &str = "You are an expert social media strategist. \
     You write concise, platform-appropriate content and always answer with valid JSON only.";

pub const INSIGHTS_SYSTEM_PROMPT: &str = "You are a senior marketing analyst. \
     You explain performance data plainly and always answer with valid JSON only.";

const SUGGESTION_SCHEMA: &str = r##"[
  {
    "title": "short working title",
    "content": "the full post text",
    "platform": "facebook | instagram | linkedin",
    "content_type": "post | story | reel | article | carousel",
    "hashtags": ["#example"],
    "best_time_to_post": "e.g. Tuesday 10:00",
    "expected_engagement": "low | medium | high",
    "rationale": "why this should perform well"
  }
]"##;

const INSIGHT_SCHEMA: &str = r#"{
  "summary": "two or three sentence overview",
  "key_findings": ["..."],
  "recommendations": ["..."],
  "trends": ["..."],
  "opportunities": ["..."]
}"#;

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[must_use]
pub fn content_suggestions_prompt(
    analytics_data: &Value,
    objectives: &Value,
    competitor_data: &Value,
) -> String {
    format!(
        "Based on the following social media analytics, business objectives and competitor \
         activity, propose 5 content ideas for the coming week.\n\n\
         Analytics data:\n{}\n\n\
         Business objectives:\n{}\n\n\
         Competitor data:\n{}\n\n\
         Respond with a JSON array in exactly this format:\n{SUGGESTION_SCHEMA}",
        pretty(analytics_data),
        pretty(objectives),
        pretty(competitor_data),
    )
}

#[must_use]
pub fn analytics_insights_prompt(metrics: &Value, platform_data: &Value) -> String {
    format!(
        "Analyze the following marketing performance data and explain what is driving it.\n\n\
         Aggregated metrics:\n{}\n\n\
         Per-platform data:\n{}\n\n\
         Respond with a JSON object in exactly this format:\n{INSIGHT_SCHEMA}",
        pretty(metrics),
        pretty(platform_data),
    )
}
