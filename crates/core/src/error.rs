use serde::Serialize;
use std::fmt;

/// One step of the linear run. Stages only ever advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Search,
    Extract,
    Synthesize,
    Recommend,
    Done,
}

impl Stage {
    pub fn next(self) -> Self {
        match self {
            Stage::Search => Stage::Extract,
            Stage::Extract => Stage::Synthesize,
            Stage::Synthesize => Stage::Recommend,
            Stage::Recommend | Stage::Done => Stage::Done,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Search => "search",
            Stage::Extract => "extract",
            Stage::Synthesize => "synthesize",
            Stage::Recommend => "recommend",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal failures of a run. Carried inside `anyhow::Error`; recover with `downcast_ref`.
#[derive(Debug, Clone)]
pub enum PipelineError {
    ConfigMissing {
        key: &'static str,
    },
    SearchUnavailable {
        status: Option<u16>,
        detail: String,
    },
    StageFailed {
        stage: Stage,
        detail: String,
    },
    MalformedRecommendation {
        detail: String,
        raw_output: String,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::ConfigMissing { .. } => None,
            PipelineError::SearchUnavailable { .. } => Some(Stage::Search),
            PipelineError::StageFailed { stage, .. } => Some(*stage),
            PipelineError::MalformedRecommendation { .. } => Some(Stage::Recommend),
        }
    }

    pub fn raw_output(&self) -> Option<&str> {
        match self {
            PipelineError::MalformedRecommendation { raw_output, .. } => Some(raw_output),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::ConfigMissing { key } => {
                write!(f, "configuration error: {key} is required")
            }
            PipelineError::SearchUnavailable {
                status: Some(status),
                detail,
            } => write!(f, "stage=search failed: search API returned HTTP {status}: {detail}"),
            PipelineError::SearchUnavailable {
                status: None,
                detail,
            } => write!(f, "stage=search failed: search API unreachable: {detail}"),
            PipelineError::StageFailed { stage, detail } => {
                write!(f, "stage={stage} failed: {detail}")
            }
            PipelineError::MalformedRecommendation { detail, .. } => {
                write!(f, "stage=recommend failed: malformed recommendation: {detail}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// A non-fatal extraction failure. The run continues with a placeholder summary.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionDegraded {
    pub index: usize,
    pub url: String,
    pub reason: String,
}
