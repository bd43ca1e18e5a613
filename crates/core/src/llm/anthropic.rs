use crate::config::PipelineConfig;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{Completion, CompletionRequest, LlmClient, Provider, ToolSpec};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS_RETRY_FLOOR: u32 = 4096;

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_config(config: &PipelineConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.llm_timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key: config.llm_api_key.clone(),
            base_url: config.llm_base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    async fn create_message(
        &self,
        purpose: &'static str,
        req: &CreateMessageRequest,
    ) -> anyhow::Result<(serde_json::Value, CreateMessageResponse)> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(req)
            .send()
            .await
            .map_err(|err| LlmDiagnosticsError {
                provider: Provider::Anthropic,
                purpose,
                phase: "transport",
                detail: err.to_string(),
                raw_output: None,
                raw_response_json: None,
            })?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<serde_json::Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                purpose,
                phase: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text)
            .with_context(|| format!("failed to parse Anthropic response JSON: {text}"))?;
        let parsed = serde_json::from_value::<CreateMessageResponse>(raw_json.clone())
            .context("failed to decode Anthropic response into CreateMessageResponse")?;
        Ok((raw_json, parsed))
    }

    fn build_request(&self, request: &CompletionRequest, max_tokens: u32) -> CreateMessageRequest {
        let (tools, tool_choice) = match &request.tool {
            Some(tool) => (
                Some(vec![Tool::from_spec(tool)]),
                Some(ToolChoice::Tool { name: tool.name }),
            ),
            None => (None, None),
        };

        CreateMessageRequest {
            model: self.model.clone(),
            max_tokens,
            temperature: Some(request.temperature),
            system: Some(request.system.clone()),
            messages: vec![Message {
                role: "user",
                content: request.user.clone(),
            }],
            tools,
            tool_choice,
        }
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    fn response_tool_input(res: &CreateMessageResponse, tool_name: &str) -> Option<serde_json::Value> {
        res.content.iter().find_map(|block| match block {
            ContentBlock::ToolUse { name, input, .. } if name == tool_name => Some(input.clone()),
            _ => None,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<Completion> {
        let max_tokens = request.max_tokens.unwrap_or(self.max_tokens);
        let (_, mut res) = self
            .create_message(request.purpose, &self.build_request(&request, max_tokens))
            .await?;

        // If the model hit max_tokens, retry once with a higher ceiling.
        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            let bumped = max_tokens.saturating_mul(2).max(MAX_TOKENS_RETRY_FLOOR);
            tracing::warn!(
                purpose = request.purpose,
                from = max_tokens,
                to = bumped,
                "Anthropic stop_reason=max_tokens; retrying once with higher max_tokens"
            );
            let (_, r) = self
                .create_message(request.purpose, &self.build_request(&request, bumped))
                .await?;
            res = r;
        }

        let tool_input = request
            .tool
            .as_ref()
            .and_then(|tool| Self::response_tool_input(&res, tool.name));

        Ok(Completion {
            text: Self::response_text(&res),
            tool_input,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: serde_json::Value,
}

impl Tool {
    fn from_spec(spec: &ToolSpec) -> Self {
        Self {
            name: spec.name,
            description: spec.description,
            input_schema: spec.input_schema.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_text_blocks_and_skips_unknown_blocks() {
        let res: CreateMessageResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "...", "signature": "sig"},
                {"type": "text", "text": "Bitcoin consolidated."},
                {"type": "text", "text": "Volume was light."}
            ],
            "stop_reason": "end_turn"
        }))
        .unwrap();

        assert_eq!(
            AnthropicClient::response_text(&res),
            "Bitcoin consolidated.\nVolume was light."
        );
    }

    #[test]
    fn finds_matching_tool_use_input() {
        let res: CreateMessageResponse = serde_json::from_value(json!({
            "content": [
                {"type": "tool_use", "id": "toolu_1", "name": "other_tool", "input": {"x": 1}},
                {"type": "tool_use", "id": "toolu_2", "name": "emit_recommendation", "input": {"verdict": "HOLD"}}
            ]
        }))
        .unwrap();

        let input = AnthropicClient::response_tool_input(&res, "emit_recommendation").unwrap();
        assert_eq!(input, json!({"verdict": "HOLD"}));
        assert!(AnthropicClient::response_tool_input(&res, "missing").is_none());
    }

    #[test]
    fn request_forces_tool_choice_when_tool_given() {
        let client = AnthropicClient {
            http: reqwest::Client::new(),
            api_key: "k".to_string(),
            base_url: "http://localhost".to_string(),
            model: "claude-test".to_string(),
            max_tokens: 1024,
        };
        let request = CompletionRequest {
            purpose: "recommend",
            system: "sys".to_string(),
            user: "narrative".to_string(),
            temperature: 0.2,
            max_tokens: None,
            tool: Some(ToolSpec {
                name: "emit_recommendation",
                description: "d",
                input_schema: json!({"type": "object"}),
            }),
        };

        let body = serde_json::to_value(client.build_request(&request, 1024)).unwrap();
        assert_eq!(body["tool_choice"], json!({"type": "tool", "name": "emit_recommendation"}));
        assert_eq!(body["tools"][0]["name"], "emit_recommendation");
        assert_eq!(body["messages"][0]["role"], "user");

        let plain = CompletionRequest {
            tool: None,
            ..request
        };
        let body = serde_json::to_value(client.build_request(&plain, 1024)).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }
}
