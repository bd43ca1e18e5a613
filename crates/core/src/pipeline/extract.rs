use crate::config::PipelineConfig;
use crate::domain::article::{ArticleRef, ArticleSummary};
use crate::error::ExtractionDegraded;
use crate::fetch::{PageFetcher, MAX_PAGE_CHARS};
use crate::llm::{CompletionRequest, LlmClient};
use crate::pipeline::prompts;

const SUMMARY_MAX_TOKENS: u32 = 400;

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Exactly one per input article, in input order.
    pub summaries: Vec<ArticleSummary>,
    pub degraded: Vec<ExtractionDegraded>,
}

/// Summarizes every article. Never fails: an article without usable content, or whose
/// summary call fails, becomes an "insufficient information" placeholder.
pub async fn extract_all(
    llm: &dyn LlmClient,
    pages: Option<&dyn PageFetcher>,
    config: &PipelineConfig,
    articles: &[ArticleRef],
) -> Extraction {
    let mut out = Extraction {
        summaries: Vec::with_capacity(articles.len()),
        degraded: Vec::new(),
    };

    for (index, article) in articles.iter().enumerate() {
        let content = article_content(pages, article).await;

        if content.trim().is_empty() {
            tracing::warn!(index, url = %article.url, "article has no content; using placeholder");
            out.degraded.push(ExtractionDegraded {
                index,
                url: article.url.clone(),
                reason: "empty content".to_string(),
            });
            out.summaries.push(ArticleSummary::insufficient(article.clone()));
            continue;
        }

        match summarize(llm, config, article, &content).await {
            Ok(summary) => out
                .summaries
                .push(ArticleSummary::summarized(article.clone(), summary)),
            Err(err) => {
                tracing::warn!(
                    index,
                    url = %article.url,
                    error = %format!("{err:#}"),
                    "article summary failed; using placeholder"
                );
                out.degraded.push(ExtractionDegraded {
                    index,
                    url: article.url.clone(),
                    reason: format!("{err:#}"),
                });
                out.summaries.push(ArticleSummary::insufficient(article.clone()));
            }
        }
    }

    out
}

/// Snippet, plus page text when a fetcher is configured. Page failures fall back to the snippet.
async fn article_content(pages: Option<&dyn PageFetcher>, article: &ArticleRef) -> String {
    let snippet = article.snippet.trim().to_string();
    let Some(pages) = pages else {
        return snippet;
    };

    match pages.fetch_text(&article.url).await {
        Ok(text) if !text.trim().is_empty() => {
            let mut content = if snippet.is_empty() {
                text
            } else {
                format!("{snippet}\n\n{text}")
            };
            if content.chars().count() > MAX_PAGE_CHARS {
                content = content.chars().take(MAX_PAGE_CHARS).collect();
            }
            content
        }
        Ok(_) => snippet,
        Err(err) => {
            tracing::debug!(url = %article.url, error = %err, "page fetch failed; using snippet");
            snippet
        }
    }
}

async fn summarize(
    llm: &dyn LlmClient,
    config: &PipelineConfig,
    article: &ArticleRef,
    content: &str,
) -> anyhow::Result<String> {
    let completion = llm
        .complete(CompletionRequest {
            purpose: "extract",
            system: prompts::article_analyst_system(),
            user: prompts::article_analyst_user(article, content),
            temperature: config.temperature,
            max_tokens: Some(SUMMARY_MAX_TOKENS),
            tool: None,
        })
        .await?;

    let summary = bound_summary(&completion.text, config.summary_max_chars);
    anyhow::ensure!(!summary.is_empty(), "model returned an empty summary");
    Ok(summary)
}

/// Collapses whitespace and caps length at `max_chars` on a character boundary.
pub fn bound_summary(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max_chars.saturating_sub(3)).collect();
    cut = cut.trim_end().to_string();
    cut.push_str("...");
    cut
}
