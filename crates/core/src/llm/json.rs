use crate::domain::contract::LlmRecommendation;
use crate::domain::recommendation::Recommendation;
use crate::llm::text;
use anyhow::Context;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse_recommendation_value(value: serde_json::Value) -> anyhow::Result<Recommendation> {
    let parsed = serde_json::from_value::<LlmRecommendation>(value)
        .context("tool input does not match the recommendation schema")?;
    parsed.validate_and_into_recommendation()
}

/// Tolerant parse of free-form model text: embedded JSON first, then labelled sections.
pub fn parse_recommendation_text(text: &str) -> anyhow::Result<Recommendation> {
    let json_err = match extract_json(text) {
        Some(json_str) => match serde_json::from_str::<LlmRecommendation>(&json_str) {
            Ok(parsed) => return parsed.validate_and_into_recommendation(),
            Err(err) => Some(err),
        },
        None => None,
    };

    match text::parse_labelled(text) {
        Some(parsed) => parsed.validate_and_into_recommendation(),
        None => match json_err {
            Some(err) => Err(anyhow::anyhow!(
                "embedded JSON does not match the recommendation schema: {err}"
            )),
            None => anyhow::bail!("no JSON object or labelled recommendation found in model output"),
        },
    }
}
