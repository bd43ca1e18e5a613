//! Scripted collaborators for exercising the stages without network access.

use crate::config::{PipelineConfig, Settings};
use crate::domain::article::ArticleRef;
use crate::error::PipelineError;
use crate::fetch::PageFetcher;
use crate::llm::{Completion, CompletionRequest, LlmClient, Provider};
use crate::search::{SearchClient, SearchQuery};
use async_trait::async_trait;
use std::sync::Mutex;

pub fn test_config() -> PipelineConfig {
    let settings = Settings {
        search_api_key: Some("test-serp-key".to_string()),
        anthropic_api_key: Some("test-anthropic-key".to_string()),
        ..Default::default()
    };
    match PipelineConfig::from_settings(&settings) {
        Ok(cfg) => cfg,
        Err(err) => panic!("test settings must be valid: {err}"),
    }
}

pub fn article(title: &str, snippet: &str) -> ArticleRef {
    ArticleRef {
        title: title.to_string(),
        url: format!("https://news.example.com/{title}"),
        snippet: snippet.to_string(),
        published_at: None,
        source: Some("Example News".to_string()),
    }
}

/// Tool-use reply matching the canonical HOLD example.
pub fn hold_completion() -> Completion {
    Completion {
        text: String::new(),
        tool_input: Some(serde_json::json!({
            "verdict": "HOLD",
            "confidence": "MEDIUM",
            "reasons": ["mixed short-term signals"],
            "risks": ["regulatory uncertainty"],
            "guidance": "wait for breakout confirmation"
        })),
    }
}

pub enum FakeSearchBehavior {
    Results(Vec<ArticleRef>),
    Status(u16),
    Error(String),
}

pub struct FakeSearch {
    behavior: FakeSearchBehavior,
}

impl FakeSearch {
    pub fn returning(articles: Vec<ArticleRef>) -> Self {
        Self {
            behavior: FakeSearchBehavior::Results(articles),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            behavior: FakeSearchBehavior::Status(status),
        }
    }

    /// Fails with an untyped error, as a misbehaving client might.
    pub fn erroring(message: &str) -> Self {
        Self {
            behavior: FakeSearchBehavior::Error(message.to_string()),
        }
    }
}

#[async_trait]
impl SearchClient for FakeSearch {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    async fn search(&self, _query: &SearchQuery) -> anyhow::Result<Vec<ArticleRef>> {
        match &self.behavior {
            FakeSearchBehavior::Results(articles) => Ok(articles.clone()),
            FakeSearchBehavior::Status(status) => Err(PipelineError::SearchUnavailable {
                status: Some(*status),
                detail: "fake upstream error".to_string(),
            }
            .into()),
            FakeSearchBehavior::Error(message) => Err(anyhow::anyhow!(message.clone())),
        }
    }
}

/// Answers by `CompletionRequest::purpose` and records every prompt it receives.
#[derive(Default)]
pub struct ScriptedLlm {
    summary: Option<String>,
    narrative: Option<String>,
    recommendation: Option<Completion>,
    failing_titles: Vec<String>,
    failing_purposes: Vec<&'static str>,
    calls: Mutex<Vec<(&'static str, String)>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_summary(mut self, text: &str) -> Self {
        self.summary = Some(text.to_string());
        self
    }

    pub fn with_narrative(mut self, text: &str) -> Self {
        self.narrative = Some(text.to_string());
        self
    }

    pub fn with_recommendation(mut self, completion: Completion) -> Self {
        self.recommendation = Some(completion);
        self
    }

    /// Extraction calls whose prompt names this article title fail.
    pub fn failing_extract_for(mut self, title: &str) -> Self {
        self.failing_titles.push(title.to_string());
        self
    }

    pub fn failing(mut self, purpose: &'static str) -> Self {
        self.failing_purposes.push(purpose);
        self
    }

    fn recorded(&self) -> Vec<(&'static str, String)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn calls_for(&self, purpose: &str) -> usize {
        self.recorded().iter().filter(|(p, _)| *p == purpose).count()
    }

    pub fn total_calls(&self) -> usize {
        self.recorded().len()
    }

    pub fn last_prompt(&self, purpose: &str) -> Option<String> {
        self.recorded()
            .into_iter()
            .rev()
            .find(|(p, _)| *p == purpose)
            .map(|(_, prompt)| prompt)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<Completion> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((request.purpose, request.user.clone()));
        }

        if self.failing_purposes.contains(&request.purpose) {
            anyhow::bail!("scripted {} failure", request.purpose);
        }

        match request.purpose {
            "extract" => {
                let fails = self
                    .failing_titles
                    .iter()
                    .any(|t| request.user.contains(&format!("Title: {t}\n")));
                if fails {
                    anyhow::bail!("scripted extract failure");
                }
                Ok(Completion {
                    text: self.summary.clone().unwrap_or_default(),
                    tool_input: None,
                })
            }
            "synthesize" => Ok(Completion {
                text: self.narrative.clone().unwrap_or_default(),
                tool_input: None,
            }),
            "recommend" => Ok(self.recommendation.clone().unwrap_or_default()),
            other => anyhow::bail!("unexpected purpose {other}"),
        }
    }
}

pub struct StaticPages {
    text: String,
}

impl StaticPages {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl PageFetcher for StaticPages {
    async fn fetch_text(&self, _url: &str) -> anyhow::Result<String> {
        Ok(self.text.clone())
    }
}

pub struct FailingPages;

#[async_trait]
impl PageFetcher for FailingPages {
    async fn fetch_text(&self, url: &str) -> anyhow::Result<String> {
        anyhow::bail!("page unavailable: {url}")
    }
}
