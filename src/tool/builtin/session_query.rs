//! Read-only sibling of the `handoff` tool: answer a question about another
//! session's history without touching any handoff state (§6).

use crate::handoff::gather_conversation;
use crate::provider::{ChatRequest, CompletionOutcome, ModelClient};
use crate::session::SessionStore;
use crate::tool::{DangerLevel, Tool, ToolContext, ToolError, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

const SYSTEM_PROMPT: &str =
    "Answer the question using only the conversation transcript provided. \
     If the transcript does not contain the answer, say so plainly.";

pub struct SessionQueryTool {
    store: Arc<SessionStore>,
    client: Arc<dyn ModelClient>,
    model: String,
}

impl SessionQueryTool {
    #[must_use]
    pub fn new(store: Arc<SessionStore>, client: Arc<dyn ModelClient>, model: String) -> Self {
        Self { store, client, model }
    }
}

#[async_trait]
impl Tool for SessionQueryTool {
    fn name(&self) -> &str {
        "session_query"
    }

    fn description(&self) -> &str {
        "Ask a question about the contents of another session, identified by its file path, \
         without switching to it."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "session_path": {
                    "type": "string",
                    "description": "Path to the session file to inspect"
                },
                "question": {
                    "type": "string",
                    "description": "The question to answer about that session's history"
                }
            },
            "required": ["session_path", "question"]
        })
    }

    fn danger_level(&self) -> DangerLevel {
        DangerLevel::Safe
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let session_path = args
            .get("session_path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs("session_path is required".to_string()))?;
        let question = args
            .get("question")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs("question is required".to_string()))?;

        let messages = self
            .store
            .branch(&PathBuf::from(session_path))
            .map_err(|e| ToolError::InvalidArgs(format!("could not read session: {e}")))?;

        let Some(conversation_text) = gather_conversation(&messages) else {
            return Ok(ToolResult::ok("that session has no messages yet".to_string()));
        };

        let prompt = format!("## Conversation History\n\n{conversation_text}\n\n## Question\n\n{question}");
        let request = ChatRequest {
            model: self.model.clone(),
            messages: Arc::new(vec![crate::provider::Message {
                role: crate::provider::Role::User,
                content: Arc::new(vec![crate::provider::ContentBlock::Text { text: prompt }]),
                timestamp: 0,
            }]),
            system: Some(Cow::Borrowed(SYSTEM_PROMPT)),
            tools: Arc::new(Vec::new()),
            max_tokens: None,
        };

        match self.client.complete(request, ctx.abort_signal.clone()).await.into_text() {
            Ok((text, _usage)) => Ok(ToolResult::ok(text)),
            Err(CompletionOutcome::Error(message)) => Err(ToolError::ExecutionFailed(message)),
            Err(_) => Err(ToolError::ExecutionFailed("session query cancelled".to_string())),
        }
    }
}
