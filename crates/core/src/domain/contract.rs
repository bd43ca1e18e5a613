use crate::domain::recommendation::{Confidence, Recommendation, Verdict};
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

/// The recommendation shape as the model emits it, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRecommendation {
    #[serde(alias = "recommendation", alias = "decision")]
    pub verdict: String,
    #[serde(alias = "confidence_level")]
    pub confidence: String,
    #[serde(default, alias = "supporting_reasons")]
    pub reasons: OneOrMany,
    #[serde(default, alias = "risk_factors")]
    pub risks: OneOrMany,
    #[serde(default, alias = "entry_exit", alias = "entry_exit_guidance")]
    pub guidance: String,
    #[serde(default)]
    pub time_horizon: Option<String>,
}

/// Models occasionally return a single string where a list was requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<String>),
    One(String),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl OneOrMany {
    fn into_clean_vec(self) -> Vec<String> {
        let items = match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(s) => vec![s],
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(v: Vec<String>) -> Self {
        OneOrMany::Many(v)
    }
}

impl LlmRecommendation {
    pub fn validate_and_into_recommendation(self) -> anyhow::Result<Recommendation> {
        let verdict = Verdict::parse_loose(&self.verdict)
            .with_context(|| format!("verdict must be BUY, SELL or HOLD (got {:?})", self.verdict))?;
        let confidence = Confidence::parse_loose(&self.confidence).with_context(|| {
            format!(
                "confidence must be HIGH, MEDIUM or LOW (got {:?})",
                self.confidence
            )
        })?;

        let reasons = self.reasons.into_clean_vec();
        ensure!(!reasons.is_empty(), "reasons must be non-empty");

        let risks = self.risks.into_clean_vec();
        ensure!(!risks.is_empty(), "risks must be non-empty");

        let guidance = self.guidance.trim().to_string();
        ensure!(!guidance.is_empty(), "guidance must be non-empty");

        let time_horizon = self
            .time_horizon
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Recommendation {
            verdict,
            confidence,
            reasons,
            risks,
            guidance,
            time_horizon,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_lower_case_values_and_aliases() {
        let raw: LlmRecommendation = serde_json::from_value(json!({
            "recommendation": "hold",
            "confidence": "Medium",
            "reasons": ["mixed short-term signals"],
            "risk_factors": ["regulatory uncertainty"],
            "guidance": "wait for breakout confirmation",
        }))
        .unwrap();

        let rec = raw.validate_and_into_recommendation().unwrap();
        assert_eq!(rec.verdict, Verdict::Hold);
        assert_eq!(rec.confidence, Confidence::Medium);
        assert_eq!(rec.reasons, vec!["mixed short-term signals"]);
        assert_eq!(rec.risks, vec!["regulatory uncertainty"]);
        assert_eq!(rec.guidance, "wait for breakout confirmation");
        assert_eq!(rec.time_horizon, None);
    }

    #[test]
    fn single_string_lists_become_one_item() {
        let raw: LlmRecommendation = serde_json::from_value(json!({
            "verdict": "BUY",
            "confidence": "HIGH",
            "reasons": "ETF inflows accelerating",
            "risks": ["  ", "macro data surprise"],
            "guidance": "scale in below 61k",
            "time_horizon": "1-3 days",
        }))
        .unwrap();

        let rec = raw.validate_and_into_recommendation().unwrap();
        assert_eq!(rec.reasons, vec!["ETF inflows accelerating"]);
        assert_eq!(rec.risks, vec!["macro data surprise"]);
        assert_eq!(rec.time_horizon.as_deref(), Some("1-3 days"));
    }

    #[test]
    fn rejects_unknown_verdict() {
        let raw = LlmRecommendation {
            verdict: "ACCUMULATE".to_string(),
            confidence: "LOW".to_string(),
            reasons: vec!["a".to_string()].into(),
            risks: vec!["b".to_string()].into(),
            guidance: "c".to_string(),
            time_horizon: None,
        };
        assert!(raw.validate_and_into_recommendation().is_err());
    }

    #[test]
    fn rejects_empty_risks() {
        let raw = LlmRecommendation {
            verdict: "SELL".to_string(),
            confidence: "LOW".to_string(),
            reasons: vec!["a".to_string()].into(),
            risks: OneOrMany::default(),
            guidance: "c".to_string(),
            time_horizon: None,
        };
        let err = raw.validate_and_into_recommendation().unwrap_err();
        assert!(err.to_string().contains("risks"));
    }
}
