pub mod extract;
pub mod prompts;
pub mod recommend;
pub mod synthesize;

use crate::config::PipelineConfig;
use crate::domain::article::{ArticleRef, ArticleSummary};
use crate::domain::recommendation::{MarketNarrative, Recommendation};
use crate::domain::report::RunReport;
use crate::error::{PipelineError, Stage};
use crate::fetch::{HttpPageFetcher, PageFetcher};
use crate::llm::anthropic::AnthropicClient;
use crate::llm::LlmClient;
use crate::search::serpapi::SerpApiClient;
use crate::search::{finalize_results, SearchClient, SearchQuery};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub use extract::Extraction;

pub const DEFAULT_QUERY: &str = "Bitcoin market today";

/// The four-stage run: Search, Extract, Synthesize, Recommend. Stages share no state;
/// each takes the previous stage's full output.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    search: Arc<dyn SearchClient>,
    llm: Arc<dyn LlmClient>,
    pages: Option<Arc<dyn PageFetcher>>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        search: Arc<dyn SearchClient>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            config,
            search,
            llm,
            pages: None,
        }
    }

    pub fn with_page_fetcher(mut self, pages: Arc<dyn PageFetcher>) -> Self {
        self.pages = Some(pages);
        self
    }

    /// Wires the HTTP clients for SerpAPI, Anthropic and (optionally) page fetching.
    pub fn from_config(config: PipelineConfig) -> anyhow::Result<Self> {
        let search = Arc::new(SerpApiClient::from_config(&config)?);
        let llm = Arc::new(AnthropicClient::from_config(&config)?);
        let fetch_pages = config.fetch_pages;

        let pipeline = Self::new(config, search, llm);
        if fetch_pages {
            return Ok(pipeline.with_page_fetcher(Arc::new(HttpPageFetcher::new()?)));
        }
        Ok(pipeline)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn search(&self, query: &str) -> anyhow::Result<Vec<ArticleRef>> {
        let query = SearchQuery {
            text: query.to_string(),
            recency_hours: self.config.recency_hours,
            max_results: self.config.max_articles,
        };

        let raw = self.search.search(&query).await.map_err(|err| {
            match err.downcast::<PipelineError>() {
                Ok(pe) => anyhow::Error::new(pe),
                Err(other) => PipelineError::SearchUnavailable {
                    status: None,
                    detail: format!("{other:#}"),
                }
                .into(),
            }
        })?;

        let raw_len = raw.len();
        let articles = finalize_results(raw, &query, Utc::now());
        tracing::info!(
            provider = self.search.provider_name(),
            raw = raw_len,
            articles = articles.len(),
            "search stage complete"
        );

        if articles.is_empty() {
            return Err(PipelineError::StageFailed {
                stage: Stage::Search,
                detail: format!(
                    "no articles found within the last {} hours",
                    self.config.recency_hours
                ),
            }
            .into());
        }
        Ok(articles)
    }

    pub async fn extract(&self, articles: &[ArticleRef]) -> Extraction {
        extract::extract_all(
            self.llm.as_ref(),
            self.pages.as_deref(),
            &self.config,
            articles,
        )
        .await
    }

    pub async fn synthesize(&self, summaries: &[ArticleSummary]) -> anyhow::Result<MarketNarrative> {
        synthesize::synthesize(self.llm.as_ref(), &self.config, summaries).await
    }

    pub async fn recommend(&self, narrative: &MarketNarrative) -> anyhow::Result<Recommendation> {
        recommend::recommend(self.llm.as_ref(), &self.config, narrative).await
    }

    pub async fn run(&self, query: &str) -> anyhow::Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut stage = Stage::Search;
        tracing::info!(%run_id, %stage, query, "run started");

        let articles = self.search(query).await?;

        stage = stage.next();
        tracing::info!(%run_id, %stage, articles = articles.len(), "extracting articles");
        let Extraction { summaries, degraded } = self.extract(&articles).await;
        if !degraded.is_empty() {
            tracing::warn!(
                %run_id,
                degraded = degraded.len(),
                summaries = summaries.len(),
                "extraction degraded; continuing with placeholders"
            );
        }

        stage = stage.next();
        tracing::info!(%run_id, %stage, summaries = summaries.len(), "synthesizing narrative");
        let narrative = self.synthesize(&summaries).await?;

        stage = stage.next();
        tracing::info!(%run_id, %stage, narrative_chars = narrative.text.len(), "requesting recommendation");
        let recommendation = self.recommend(&narrative).await?;

        stage = stage.next();
        tracing::info!(
            %run_id,
            %stage,
            verdict = %recommendation.verdict,
            confidence = %recommendation.confidence,
            "run finished"
        );

        Ok(RunReport {
            run_id,
            query: query.to_string(),
            started_at,
            finished_at: Utc::now(),
            articles,
            summaries,
            narrative,
            recommendation,
            degraded,
        })
    }
}
