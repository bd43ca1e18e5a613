pub mod domain;
pub mod error;
pub mod fetch;
pub mod llm;
pub mod net;
pub mod pipeline;
pub mod search;
pub mod test_support;

pub mod config {
    use crate::error::PipelineError;
    use serde::Serialize;
    use std::time::Duration;

    pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
    pub const DEFAULT_SEARCH_BASE_URL: &str = "https://serpapi.com";
    pub const DEFAULT_LLM_BASE_URL: &str = "https://api.anthropic.com";
    pub const DEFAULT_MAX_ARTICLES: usize = 5;
    pub const MAX_ARTICLES_CEILING: usize = 10;
    pub const DEFAULT_RECENCY_HOURS: u32 = 24;
    pub const DEFAULT_MAX_TOKENS: u32 = 2048;
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;
    pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 600;
    const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 15;
    const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

    /// Raw values read from the process environment. Nothing is validated here.
    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub search_api_key: Option<String>,
        pub search_base_url: Option<String>,
        pub search_timeout_secs: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub anthropic_base_url: Option<String>,
        pub anthropic_model: Option<String>,
        pub anthropic_max_tokens: Option<String>,
        pub anthropic_timeout_secs: Option<String>,
        pub llm_temperature: Option<String>,
        pub max_articles: Option<String>,
        pub recency_hours: Option<String>,
        pub fetch_pages: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                // SERPER_API_KEY is the name older .env files carry for the same SerpAPI key.
                search_api_key: std::env::var("SERPAPI_API_KEY")
                    .ok()
                    .or_else(|| std::env::var("SERPER_API_KEY").ok()),
                search_base_url: std::env::var("SEARCH_BASE_URL").ok(),
                search_timeout_secs: std::env::var("SEARCH_TIMEOUT_SECS").ok(),
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                anthropic_base_url: std::env::var("ANTHROPIC_BASE_URL").ok(),
                anthropic_model: std::env::var("ANTHROPIC_MODEL").ok(),
                anthropic_max_tokens: std::env::var("ANTHROPIC_MAX_TOKENS").ok(),
                anthropic_timeout_secs: std::env::var("ANTHROPIC_TIMEOUT_SECS").ok(),
                llm_temperature: std::env::var("LLM_TEMPERATURE").ok(),
                max_articles: std::env::var("MAX_ARTICLES").ok(),
                recency_hours: std::env::var("RECENCY_HOURS").ok(),
                fetch_pages: std::env::var("FETCH_PAGES").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_search_api_key(&self) -> Result<&str, PipelineError> {
            require_secret(self.search_api_key.as_deref(), "SERPAPI_API_KEY")
        }

        pub fn require_anthropic_api_key(&self) -> Result<&str, PipelineError> {
            require_secret(self.anthropic_api_key.as_deref(), "ANTHROPIC_API_KEY")
        }
    }

    fn require_secret<'a>(
        value: Option<&'a str>,
        key: &'static str,
    ) -> Result<&'a str, PipelineError> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() && !is_placeholder(v) => Ok(v),
            _ => Err(PipelineError::ConfigMissing { key }),
        }
    }

    // Values copied verbatim from a .env.example template.
    fn is_placeholder(value: &str) -> bool {
        let lower = value.to_ascii_lowercase();
        lower.starts_with("your_") && lower.ends_with("_here")
    }

    fn parse_or<T: std::str::FromStr>(value: Option<&str>, default: T) -> T {
        value
            .and_then(|s| s.trim().parse::<T>().ok())
            .unwrap_or(default)
    }

    fn parse_flag(value: Option<&str>) -> bool {
        matches!(
            value.map(|s| s.trim().to_ascii_lowercase()).as_deref(),
            Some("1" | "true" | "yes" | "on")
        )
    }

    /// Validated configuration, built once at startup and handed to every stage.
    #[derive(Debug, Clone, Serialize)]
    pub struct PipelineConfig {
        #[serde(skip_serializing)]
        pub search_api_key: String,
        #[serde(skip_serializing)]
        pub llm_api_key: String,
        pub search_base_url: String,
        pub llm_base_url: String,
        pub model: String,
        pub max_articles: usize,
        pub recency_hours: u32,
        pub temperature: f32,
        pub max_tokens: u32,
        pub summary_max_chars: usize,
        pub fetch_pages: bool,
        pub search_timeout: Duration,
        pub llm_timeout: Duration,
    }

    impl PipelineConfig {
        pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
            let search_api_key = settings.require_search_api_key()?.to_string();
            let llm_api_key = settings.require_anthropic_api_key()?.to_string();

            let max_articles = parse_or(settings.max_articles.as_deref(), DEFAULT_MAX_ARTICLES)
                .clamp(1, MAX_ARTICLES_CEILING);
            let recency_hours =
                parse_or(settings.recency_hours.as_deref(), DEFAULT_RECENCY_HOURS).max(1);
            let temperature = parse_or(settings.llm_temperature.as_deref(), DEFAULT_TEMPERATURE)
                .clamp(0.0, 1.0);

            Ok(Self {
                search_api_key,
                llm_api_key,
                search_base_url: settings
                    .search_base_url
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SEARCH_BASE_URL.to_string()),
                llm_base_url: settings
                    .anthropic_base_url
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
                model: settings
                    .anthropic_model
                    .clone()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                max_articles,
                recency_hours,
                temperature,
                max_tokens: parse_or(settings.anthropic_max_tokens.as_deref(), DEFAULT_MAX_TOKENS),
                summary_max_chars: DEFAULT_SUMMARY_MAX_CHARS,
                fetch_pages: parse_flag(settings.fetch_pages.as_deref()),
                search_timeout: Duration::from_secs(parse_or(
                    settings.search_timeout_secs.as_deref(),
                    DEFAULT_SEARCH_TIMEOUT_SECS,
                )),
                llm_timeout: Duration::from_secs(parse_or(
                    settings.anthropic_timeout_secs.as_deref(),
                    DEFAULT_LLM_TIMEOUT_SECS,
                )),
            })
        }

        pub fn with_max_articles(mut self, max_articles: usize) -> Self {
            self.max_articles = max_articles.clamp(1, MAX_ARTICLES_CEILING);
            self
        }

        pub fn with_recency_hours(mut self, hours: u32) -> Self {
            self.recency_hours = hours.max(1);
            self
        }

        pub fn with_fetch_pages(mut self, fetch_pages: bool) -> Self {
            self.fetch_pages = fetch_pages;
            self
        }
    }

}
