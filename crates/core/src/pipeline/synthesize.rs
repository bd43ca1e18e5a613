use crate::config::PipelineConfig;
use crate::domain::article::ArticleSummary;
use crate::domain::recommendation::MarketNarrative;
use crate::error::{PipelineError, Stage};
use crate::llm::{CompletionRequest, LlmClient};
use crate::pipeline::prompts;

pub async fn synthesize(
    llm: &dyn LlmClient,
    config: &PipelineConfig,
    summaries: &[ArticleSummary],
) -> anyhow::Result<MarketNarrative> {
    if summaries.is_empty() {
        return Err(PipelineError::StageFailed {
            stage: Stage::Synthesize,
            detail: "no article summaries to synthesize".to_string(),
        }
        .into());
    }

    let completion = llm
        .complete(CompletionRequest {
            purpose: "synthesize",
            system: prompts::synthesizer_system(),
            user: prompts::synthesizer_user(summaries),
            temperature: config.temperature,
            max_tokens: None,
            tool: None,
        })
        .await
        .map_err(|err| {
            err.context(PipelineError::StageFailed {
                stage: Stage::Synthesize,
                detail: "language model call failed".to_string(),
            })
        })?;

    let text = completion.text.trim().to_string();
    if text.is_empty() {
        return Err(PipelineError::StageFailed {
            stage: Stage::Synthesize,
            detail: "language model returned an empty narrative".to_string(),
        }
        .into());
    }

    Ok(MarketNarrative {
        text,
        source_count: summaries.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{article, test_config, ScriptedLlm};

    fn summaries() -> Vec<ArticleSummary> {
        vec![
            ArticleSummary::summarized(article("a", "x"), "ETF inflows slowed.".to_string()),
            ArticleSummary::insufficient(article("b", "")),
            ArticleSummary::summarized(article("c", "y"), "Miners sold reserves.".to_string()),
        ]
    }

    #[tokio::test]
    async fn narrative_references_every_summary() {
        let llm = ScriptedLlm::new().with_narrative("Sentiment is mixed.");
        let narrative = synthesize(&llm, &test_config(), &summaries()).await.unwrap();

        assert_eq!(narrative.text, "Sentiment is mixed.");
        assert_eq!(narrative.source_count, 3);

        let prompt = llm.last_prompt("synthesize").unwrap();
        assert!(prompt.contains("ETF inflows slowed."));
        assert!(prompt.contains("Miners sold reserves."));
        assert!(prompt.contains("[2] b (no usable content)"));
    }

    #[tokio::test]
    async fn swapping_inputs_keeps_source_count() {
        let llm = ScriptedLlm::new().with_narrative("n");
        let mut swapped = summaries();
        swapped.swap(0, 2);

        let a = synthesize(&llm, &test_config(), &summaries()).await.unwrap();
        let b = synthesize(&llm, &test_config(), &swapped).await.unwrap();
        assert_eq!(a.source_count, b.source_count);
    }

    #[tokio::test]
    async fn model_failure_is_a_synthesize_stage_failure() {
        let llm = ScriptedLlm::new().failing("synthesize");
        let err = synthesize(&llm, &test_config(), &summaries()).await.unwrap_err();
        let pe = err.downcast_ref::<PipelineError>().unwrap();
        assert_eq!(pe.stage(), Some(Stage::Synthesize));
        assert!(format!("{err:#}").contains("scripted synthesize failure"));
    }

    #[tokio::test]
    async fn empty_reply_fails_the_stage() {
        let llm = ScriptedLlm::new().with_narrative("   ");
        let err = synthesize(&llm, &test_config(), &summaries()).await.unwrap_err();
        let pe = err.downcast_ref::<PipelineError>().unwrap();
        assert_eq!(pe.stage(), Some(Stage::Synthesize));
    }
}
