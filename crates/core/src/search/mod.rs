pub mod published;
pub mod serpapi;

use crate::domain::article::ArticleRef;
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    pub recency_hours: u32,
    pub max_results: usize,
}

#[async_trait::async_trait]
pub trait SearchClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Raw provider results in provider order. Failures are `PipelineError::SearchUnavailable`.
    async fn search(&self, query: &SearchQuery) -> anyhow::Result<Vec<ArticleRef>>;
}

/// Applies the search stage contract to raw provider results: drops entries without a
/// title or link, drops entries known to be outside the recency window, orders
/// most-recent first, removes duplicate stories and bounds the count.
pub fn finalize_results(
    raw: Vec<ArticleRef>,
    query: &SearchQuery,
    now: DateTime<Utc>,
) -> Vec<ArticleRef> {
    let cutoff = now - Duration::hours(i64::from(query.recency_hours));

    let mut articles: Vec<ArticleRef> = raw
        .into_iter()
        .filter(|a| !a.title.trim().is_empty() && !a.url.trim().is_empty())
        .filter(|a| a.published_at.map_or(true, |t| t >= cutoff))
        .collect();

    // Stable: undated results keep provider order behind dated ones.
    articles.sort_by(|a, b| match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let mut articles = dedup_articles(articles);
    articles.truncate(query.max_results);
    articles
}

/// Keeps the first occurrence of each story, keyed by normalized URL and by
/// normalized title.
pub fn dedup_articles(articles: Vec<ArticleRef>) -> Vec<ArticleRef> {
    let mut seen_urls = HashSet::new();
    let mut seen_titles = HashSet::new();
    let mut out = Vec::with_capacity(articles.len());

    for article in articles {
        let url_key = normalize_url(&article.url);
        let title_key = normalize_title(&article.title);
        if seen_urls.contains(&url_key) || seen_titles.contains(&title_key) {
            tracing::debug!(url = %article.url, title = %article.title, "dropping duplicate article");
            continue;
        }
        seen_urls.insert(url_key);
        seen_titles.insert(title_key);
        out.push(article);
    }

    out
}

fn normalize_url(raw: &str) -> String {
    match url::Url::parse(raw.trim()) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
            let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
            let path = parsed.path().trim_end_matches('/');
            format!("{host}{path}")
        }
        Err(_) => raw.trim().trim_end_matches('/').to_ascii_lowercase(),
    }
}

fn normalize_title(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
