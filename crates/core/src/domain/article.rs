use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRef {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Approximate; derived from the provider's display date.
    pub published_at: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

impl ArticleRef {
    pub fn has_content(&self) -> bool {
        !self.snippet.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub source: ArticleRef,
    pub summary_text: String,
    /// True when `summary_text` is a placeholder rather than a model summary.
    pub insufficient: bool,
}

impl ArticleSummary {
    pub fn summarized(source: ArticleRef, summary_text: String) -> Self {
        Self {
            source,
            summary_text,
            insufficient: false,
        }
    }

    pub fn insufficient(source: ArticleRef) -> Self {
        let title = source.title.trim();
        let summary_text = format!("Insufficient information: {title} provided no usable content.");
        Self {
            source,
            summary_text,
            insufficient: true,
        }
    }
}
