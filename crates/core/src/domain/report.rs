use crate::domain::article::{ArticleRef, ArticleSummary};
use crate::domain::recommendation::{MarketNarrative, Recommendation};
use crate::error::ExtractionDegraded;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Everything one run produced. Downstream consumers (report writers, mailers) treat it
/// as an opaque record.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub query: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub articles: Vec<ArticleRef>,
    pub summaries: Vec<ArticleSummary>,
    pub narrative: MarketNarrative,
    pub recommendation: Recommendation,
    pub degraded: Vec<ExtractionDegraded>,
}

impl RunReport {
    pub fn placeholder_count(&self) -> usize {
        self.summaries.iter().filter(|s| s.insufficient).count()
    }
}
