//! A minimal, non-streaming Anthropic Messages API client.

use super::{ChatRequest, CompletionOutcome, ContentBlock as CoreBlock, Error, ModelClient, Usage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
}

impl AnthropicClient {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Build a client from the `ANTHROPIC_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::MissingApiKey {
            backend: "anthropic".to_string(),
            env_var: "ANTHROPIC_API_KEY".to_string(),
        })?;
        Ok(Self::new(key))
    }
}

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDef<'a>>,
}

#[derive(Serialize)]
struct ToolDef<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a serde_json::Value,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: Vec<WireBlock>,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct Response {
    content: Vec<WireBlock>,
    #[serde(default)]
    usage: Option<ResponseUsage>,
}

#[derive(Deserialize, Default)]
struct ResponseUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn role_str(role: super::Role) -> &'static str {
    match role {
        super::Role::User | super::Role::ToolResult => "user",
        super::Role::Assistant => "assistant",
        super::Role::System => "user",
    }
}

/// Anthropic has no `thinking`/`image` wire equivalent in this minimal client;
/// thinking blocks are dropped and images are not supported.
fn to_wire_blocks(blocks: &[CoreBlock]) -> Vec<WireBlock> {
    blocks
        .iter()
        .filter_map(|b| match b {
            CoreBlock::Text { text } => Some(WireBlock::Text { text: text.clone() }),
            CoreBlock::ToolCall { id, name, arguments } => Some(WireBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: arguments.clone(),
            }),
            CoreBlock::ToolResult { tool_call_id, content, is_error } => Some(WireBlock::ToolResult {
                tool_use_id: tool_call_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            }),
            CoreBlock::Thinking { .. } | CoreBlock::Image { .. } => None,
        })
        .collect()
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn id(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: ChatRequest, abort: CancellationToken) -> CompletionOutcome {
        if abort.is_cancelled() {
            return CompletionOutcome::Aborted;
        }

        let messages = request
            .messages
            .iter()
            .map(|m| Message {
                role: role_str(m.role),
                content: to_wire_blocks(&m.content),
            })
            .filter(|m| !m.content.is_empty())
            .collect();

        let tools: Vec<ToolDef> = request
            .tools
            .iter()
            .map(|t| ToolDef {
                name: &t.name,
                description: &t.description,
                input_schema: &t.parameters,
            })
            .collect();

        let body = Request {
            model: &request.model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: request.system.as_deref(),
            messages,
            tools,
        };

        let call = self
            .http
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send();

        let resp = tokio::select! {
            () = abort.cancelled() => return CompletionOutcome::Aborted,
            result = call => result,
        };

        let resp = match resp {
            Ok(r) => r,
            Err(e) => return CompletionOutcome::Error(e.to_string()),
        };

        if !resp.status().is_success() {
            let status = resp.status();
            return match resp.json::<ErrorEnvelope>().await {
                Ok(env) => CompletionOutcome::Error(env.error.message),
                Err(_) => CompletionOutcome::Error(format!("request failed: {status}")),
            };
        }

        let parsed: Response = match resp.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to parse anthropic response");
                return CompletionOutcome::Error(e.to_string());
            }
        };

        if parsed.content.is_empty() {
            return CompletionOutcome::Error("empty response".to_string());
        }

        let blocks: Vec<CoreBlock> = parsed
            .content
            .into_iter()
            .filter_map(|b| match b {
                WireBlock::Text { text } => Some(CoreBlock::Text { text }),
                WireBlock::ToolUse { id, name, input } => Some(CoreBlock::ToolCall {
                    id,
                    name,
                    arguments: input,
                }),
                WireBlock::ToolResult { .. } | WireBlock::Other => None,
            })
            .collect();

        if blocks.is_empty() {
            return CompletionOutcome::Error("empty response".to_string());
        }

        let usage = parsed
            .usage
            .map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            })
            .unwrap_or_default();

        CompletionOutcome::Blocks { blocks, usage }
    }
}
