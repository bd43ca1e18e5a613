use crate::config::PipelineConfig;
use crate::domain::recommendation::{MarketNarrative, Recommendation};
use crate::error::{PipelineError, Stage};
use crate::llm::json::{parse_recommendation_text, parse_recommendation_value};
use crate::llm::{CompletionRequest, LlmClient};
use crate::pipeline::prompts;

/// Asks for a schema-constrained recommendation, falling back to tolerant parsing of the
/// text reply. Output that fits neither is `MalformedRecommendation` with the raw text.
pub async fn recommend(
    llm: &dyn LlmClient,
    config: &PipelineConfig,
    narrative: &MarketNarrative,
) -> anyhow::Result<Recommendation> {
    let completion = llm
        .complete(CompletionRequest {
            purpose: "recommend",
            system: prompts::strategist_system(),
            user: prompts::strategist_user(narrative),
            temperature: config.temperature,
            max_tokens: None,
            tool: Some(prompts::recommendation_tool()),
        })
        .await
        .map_err(|err| {
            err.context(PipelineError::StageFailed {
                stage: Stage::Recommend,
                detail: "language model call failed".to_string(),
            })
        })?;

    let tool_err = match completion.tool_input.clone() {
        Some(input) => match parse_recommendation_value(input) {
            Ok(rec) => return Ok(rec),
            Err(err) => Some(err),
        },
        None => None,
    };

    if !completion.text.trim().is_empty() {
        match parse_recommendation_text(&completion.text) {
            Ok(rec) => return Ok(rec),
            Err(err) => {
                return Err(malformed(err, tool_err, completion.text.trim().to_string()));
            }
        }
    }

    let raw_output = completion
        .tool_input
        .map(|v| v.to_string())
        .unwrap_or_default();
    let err = tool_err.unwrap_or_else(|| anyhow::anyhow!("model returned no output"));
    Err(malformed(err, None, raw_output))
}

fn malformed(err: anyhow::Error, tool_err: Option<anyhow::Error>, raw_output: String) -> anyhow::Error {
    let detail = match tool_err {
        Some(tool_err) => format!("{tool_err:#}; text fallback: {err:#}"),
        None => format!("{err:#}"),
    };
    tracing::warn!(detail = %detail, "recommendation output did not fit the expected shape");
    PipelineError::MalformedRecommendation { detail, raw_output }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::{Confidence, Verdict};
    use crate::llm::Completion;
    use crate::test_support::{test_config, ScriptedLlm};
    use serde_json::json;

    fn narrative() -> MarketNarrative {
        MarketNarrative {
            text: "Mixed signals; regulators active.".to_string(),
            source_count: 3,
        }
    }

    #[tokio::test]
    async fn uses_tool_input_when_present() {
        let llm = ScriptedLlm::new().with_recommendation(Completion {
            text: String::new(),
            tool_input: Some(json!({
                "verdict": "HOLD",
                "confidence": "MEDIUM",
                "reasons": ["mixed short-term signals"],
                "risks": ["regulatory uncertainty"],
                "guidance": "wait for breakout confirmation"
            })),
        });

        let rec = recommend(&llm, &test_config(), &narrative()).await.unwrap();
        assert_eq!(rec.verdict, Verdict::Hold);
        assert_eq!(rec.confidence, Confidence::Medium);
        assert_eq!(rec.reasons, vec!["mixed short-term signals"]);
        assert_eq!(rec.risks, vec!["regulatory uncertainty"]);
        assert_eq!(rec.guidance, "wait for breakout confirmation");
    }

    #[tokio::test]
    async fn falls_back_to_text_when_tool_input_is_invalid() {
        let llm = ScriptedLlm::new().with_recommendation(Completion {
            text: "Recommendation: buy\nConfidence: high\nReasons:\n- ETF demand\nRisks:\n- leverage flush\nGuidance: buy dips toward 64k".to_string(),
            tool_input: Some(json!({"verdict": "MAYBE"})),
        });

        let rec = recommend(&llm, &test_config(), &narrative()).await.unwrap();
        assert_eq!(rec.verdict, Verdict::Buy);
        assert_eq!(rec.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn unparseable_text_is_malformed_with_raw_output() {
        let raw = "Honestly the market could go either way.";
        let llm = ScriptedLlm::new().with_recommendation(Completion {
            text: raw.to_string(),
            tool_input: None,
        });

        let err = recommend(&llm, &test_config(), &narrative()).await.unwrap_err();
        let pe = err.downcast_ref::<PipelineError>().unwrap();
        assert!(matches!(pe, PipelineError::MalformedRecommendation { .. }));
        assert_eq!(pe.raw_output(), Some(raw));
    }

    #[tokio::test]
    async fn invalid_tool_input_without_text_keeps_tool_json_as_raw() {
        let llm = ScriptedLlm::new().with_recommendation(Completion {
            text: String::new(),
            tool_input: Some(json!({"verdict": "BUY", "confidence": "LOW", "reasons": [], "risks": ["x"], "guidance": "y"})),
        });

        let err = recommend(&llm, &test_config(), &narrative()).await.unwrap_err();
        let pe = err.downcast_ref::<PipelineError>().unwrap();
        assert!(pe.raw_output().unwrap().contains("\"verdict\":\"BUY\""));
        assert!(pe.to_string().contains("reasons must be non-empty"));
    }

    #[tokio::test]
    async fn prompt_carries_the_narrative() {
        let llm = ScriptedLlm::new();
        let _ = recommend(&llm, &test_config(), &narrative()).await;
        let prompt = llm.last_prompt("recommend").unwrap();
        assert!(prompt.contains("Mixed signals; regulators active."));
        assert!(prompt.contains("3 sources"));
    }
}
