//! Role-labelled prompt templates, one per model-backed stage.

use crate::domain::article::{ArticleRef, ArticleSummary};
use crate::domain::recommendation::MarketNarrative;
use crate::llm::ToolSpec;
use chrono::{DateTime, Utc};

pub const TOOL_NAME_EMIT_RECOMMENDATION: &str = "emit_recommendation";

pub fn article_analyst_system() -> String {
    [
        "You are an Article Analyst: a financial journalist with a deep understanding of cryptocurrency markets.",
        "You quickly identify the most important information in an article: price movements, market sentiment,",
        "technical analysis, major news events and risk factors.",
        "Answer with plain prose only. No headings, no bullet points, no markdown.",
    ]
    .join("\n")
}

pub fn article_analyst_user(article: &ArticleRef, content: &str) -> String {
    format!(
        "Summarize this Bitcoin article in 2-3 sentences. Cover the key points, any price movements, \
the market sentiment (bullish/bearish/neutral), catalysts and risk factors. \
Use only the information given; do not speculate.\n\n\
Title: {}\nURL: {}\nPublished: {}\n\nContent:\n{}",
        article.title,
        article.url,
        describe_published(article.published_at),
        content
    )
}

pub fn synthesizer_system() -> String {
    [
        "You are a Market Intelligence Synthesizer: a senior market analyst who identifies patterns",
        "and trends across multiple sources and turns them into one coherent view of the Bitcoin market.",
        "Answer with plain prose paragraphs.",
    ]
    .join("\n")
}

/// Every summary appears numbered, in input order, with placeholders marked.
pub fn synthesizer_user(summaries: &[ArticleSummary]) -> String {
    let mut out = format!(
        "Combine the following {} article summaries (most recent first) into a unified analysis of the \
current Bitcoin market. Identify common themes, the overall sentiment, key price levels or trends, \
major catalysts, conflicting information and uncertainties, and consensus versus outlier views. \
Refer to sources by their [n] number.\n",
        summaries.len()
    );

    for (i, s) in summaries.iter().enumerate() {
        let marker = if s.insufficient {
            " (no usable content)"
        } else {
            ""
        };
        out.push_str(&format!(
            "\n[{}] {}{}\nURL: {}\nPublished: {}\nSummary: {}\n",
            i + 1,
            s.source.title,
            marker,
            s.source.url,
            describe_published(s.source.published_at),
            s.summary_text
        ));
    }

    out
}

pub fn strategist_system() -> String {
    [
        "You are a Trading Strategist: an experienced, conservative cryptocurrency strategist.",
        "You base recommendations on solid evidence from the analysis you are given.",
        "Respond by calling the emit_recommendation tool. If you cannot call tools, answer with a single",
        "JSON object with keys verdict, confidence, reasons, risks, guidance, time_horizon.",
    ]
    .join("\n")
}

pub fn strategist_user(narrative: &MarketNarrative) -> String {
    format!(
        "Based on the market analysis below (synthesized from {} sources), give a trading recommendation \
for Bitcoin for TODAY:\n\
1. verdict: BUY, SELL or HOLD\n\
2. confidence: HIGH, MEDIUM or LOW\n\
3. reasons: short statements supporting the verdict\n\
4. risks: short statements naming the risk factors\n\
5. guidance: suggested entry/exit points or conditions\n\
6. time_horizon: how long the recommendation holds\n\n\
Market analysis:\n{}",
        narrative.source_count, narrative.text
    )
}

pub fn recommendation_tool() -> ToolSpec {
    let schema = serde_json::json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["verdict", "confidence", "reasons", "risks", "guidance"],
        "properties": {
            "verdict": {"type": "string", "enum": ["BUY", "SELL", "HOLD"]},
            "confidence": {"type": "string", "enum": ["HIGH", "MEDIUM", "LOW"]},
            "reasons": {"type": "array", "minItems": 1, "items": {"type": "string"}},
            "risks": {"type": "array", "minItems": 1, "items": {"type": "string"}},
            "guidance": {"type": "string"},
            "time_horizon": {"type": ["string", "null"]}
        }
    });

    ToolSpec {
        name: TOOL_NAME_EMIT_RECOMMENDATION,
        description: "Emit the final Bitcoin trading recommendation as structured JSON",
        input_schema: schema,
    }
}

fn describe_published(published_at: Option<DateTime<Utc>>) -> String {
    published_at
        .map(|t| t.format("%Y-%m-%d %H:%M UTC (approx.)").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
