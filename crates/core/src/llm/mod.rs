pub mod anthropic;
pub mod error;
pub mod json;
pub mod text;

use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Anthropic => f.write_str("anthropic"),
        }
    }
}

/// A JSON-schema constrained output the model is forced to emit via tool use.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Pipeline stage issuing the call; used in diagnostics and logs.
    pub purpose: &'static str,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub tool: Option<ToolSpec>,
}

#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub tool_input: Option<Value>,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<Completion>;
}
