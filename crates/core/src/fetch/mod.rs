use crate::net;
use anyhow::Context;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

pub const MAX_PAGE_CHARS: usize = 5000;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Reads the visible text of an article page.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    http: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build page fetch http client")?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_text(&self, url: &str) -> anyhow::Result<String> {
        let res = net::send_with_retry("page", || self.http.get(url))
            .await
            .with_context(|| format!("page request failed: {url}"))?;
        let res = res
            .error_for_status()
            .with_context(|| format!("page returned error status: {url}"))?;
        let html = res
            .text()
            .await
            .with_context(|| format!("failed to read page body: {url}"))?;
        Ok(html_to_text(&html, MAX_PAGE_CHARS))
    }
}

fn script_style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)\s*>")
            .expect("static regex is valid")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->|<[^>]+>").expect("static regex is valid"))
}

/// Drops scripts, styles and markup, decodes the common entities, collapses whitespace
/// and caps the result at `max_chars` characters.
pub fn html_to_text(html: &str, max_chars: usize) -> String {
    let without_code = script_style_re().replace_all(html, " ");
    let without_tags = tag_re().replace_all(&without_code, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect()
}
