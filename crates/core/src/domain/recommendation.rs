use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Strips markdown emphasis, quotes and trailing punctuation, then upper-cases.
fn normalize_token(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '*' | '_' | '`' | '"' | '\'' | '.' | '!' | ':' | ','))
        .trim()
        .to_ascii_uppercase()
}

impl Verdict {
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "BUY" => Some(Verdict::Buy),
            "SELL" => Some(Verdict::Sell),
            "HOLD" => Some(Verdict::Hold),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Buy => "BUY",
            Verdict::Sell => "SELL",
            Verdict::Hold => "HOLD",
        }
    }
}

impl Confidence {
    pub fn parse_loose(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "HIGH" => Some(Confidence::High),
            "MEDIUM" | "MODERATE" => Some(Confidence::Medium),
            "LOW" => Some(Confidence::Low),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the synthesis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketNarrative {
    pub text: String,
    /// Number of article summaries that were placed in the synthesis prompt.
    pub source_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub verdict: Verdict,
    pub confidence: Confidence,
    pub reasons: Vec<String>,
    pub risks: Vec<String>,
    pub guidance: String,
    pub time_horizon: Option<String>,
}
