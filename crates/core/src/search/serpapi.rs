use crate::config::PipelineConfig;
use crate::domain::article::ArticleRef;
use crate::error::PipelineError;
use crate::net;
use crate::search::published::parse_published;
use crate::search::{SearchClient, SearchQuery};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;

const SEARCH_PATH: &str = "/search.json";
const ENGINE: &str = "google";
const MIN_REQUESTED_RESULTS: usize = 10;
const ERROR_DETAIL_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct SerpApiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SerpApiClient {
    pub fn from_config(config: &PipelineConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.search_timeout)
            .build()
            .context("failed to build search http client")?;

        Ok(Self {
            http,
            api_key: config.search_api_key.clone(),
            base_url: config.search_base_url.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), SEARCH_PATH)
    }

    fn params(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        // Over-fetch so the window filter and dedup still leave enough results.
        let num = (query.max_results * 2).max(MIN_REQUESTED_RESULTS);
        vec![
            ("q", query.text.clone()),
            ("api_key", self.api_key.clone()),
            ("engine", ENGINE.to_string()),
            ("num", num.to_string()),
            ("tbs", recency_filter(query.recency_hours)),
        ]
    }
}

/// Google `tbs` time filter for the recency window.
fn recency_filter(hours: u32) -> String {
    match hours {
        24 => "qdr:d".to_string(),
        h if h % 24 == 0 => format!("qdr:d{}", h / 24),
        h => format!("qdr:h{h}"),
    }
}

fn truncate_detail(text: &str) -> String {
    let detail: String = text.chars().take(ERROR_DETAIL_CHARS).collect();
    if detail.is_empty() {
        "no details".to_string()
    } else {
        detail
    }
}

#[async_trait::async_trait]
impl SearchClient for SerpApiClient {
    fn provider_name(&self) -> &'static str {
        "serpapi"
    }

    async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<ArticleRef>> {
        let url = self.url();
        let params = self.params(query);

        let res = net::send_with_retry("search", || self.http.get(&url).query(&params))
            .await
            .map_err(|err| PipelineError::SearchUnavailable {
                status: None,
                detail: err.to_string(),
            })?;

        let status = res.status();
        let text = res.text().await.map_err(|err| PipelineError::SearchUnavailable {
            status: Some(status.as_u16()),
            detail: format!("failed to read search response body: {err}"),
        })?;

        if !status.is_success() {
            let detail = serde_json::from_str::<SerpResponse>(&text)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| truncate_detail(&text));
            return Err(PipelineError::SearchUnavailable {
                status: Some(status.as_u16()),
                detail,
            }
            .into());
        }

        let parsed = serde_json::from_str::<SerpResponse>(&text).map_err(|err| {
            PipelineError::SearchUnavailable {
                status: Some(status.as_u16()),
                detail: format!("search response is not valid JSON: {err}"),
            }
        })?;

        if let Some(error) = parsed.error.as_deref() {
            // An empty result set is reported through the error field.
            if error.contains("hasn't returned any results") {
                tracing::info!(query = %query.text, "search returned no results");
                return Ok(Vec::new());
            }
            return Err(PipelineError::SearchUnavailable {
                status: Some(status.as_u16()),
                detail: error.to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let articles: Vec<ArticleRef> = parsed
            .organic_results
            .into_iter()
            .map(|item| item.into_article(now))
            .collect();

        tracing::debug!(
            provider = self.provider_name(),
            results = articles.len(),
            "search response decoded"
        );
        Ok(articles)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    about_this_result: Option<AboutThisResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct AboutThisResult {
    #[serde(default)]
    source: Option<AboutSource>,
}

#[derive(Debug, Clone, Deserialize)]
struct AboutSource {
    #[serde(default)]
    description: Option<String>,
}

impl OrganicResult {
    fn into_article(self, now: DateTime<Utc>) -> ArticleRef {
        let snippet = self
            .snippet
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                self.about_this_result
                    .and_then(|a| a.source)
                    .and_then(|s| s.description)
            })
            .unwrap_or_default();

        ArticleRef {
            title: self.title.trim().to_string(),
            url: self.link.trim().to_string(),
            snippet: snippet.trim().to_string(),
            published_at: self.date.as_deref().and_then(|d| parse_published(d, now)),
            source: self.source,
        }
    }
}
