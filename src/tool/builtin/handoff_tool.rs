//! Agent-invocable wrapper around `Engine::handle_tool_call` (§4.5.2).

use crate::handoff::Engine;
use crate::tool::{DangerLevel, Tool, ToolContext, ToolError, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct HandoffTool {
    engine: Arc<Engine>,
}

impl HandoffTool {
    #[must_use]
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for HandoffTool {
    fn name(&self) -> &str {
        "handoff"
    }

    fn description(&self) -> &str {
        "Hand off the current conversation to a new, focused session carrying a goal-directed summary. \
         Use this when the current thread has accumulated context irrelevant to what comes next."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "goal": {
                    "type": "string",
                    "description": "What the new session should focus on"
                }
            },
            "required": ["goal"]
        })
    }

    fn danger_level(&self) -> DangerLevel {
        DangerLevel::Safe
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let goal = args
            .get("goal")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs("goal is required".to_string()))?;

        let outcome = self
            .engine
            .handle_tool_call(&ctx.session_path, &ctx.messages, goal)
            .await;

        match outcome {
            crate::handoff::ToolOutcome::Initiated => Ok(ToolResult::ok(outcome.as_text())),
            crate::handoff::ToolOutcome::InvalidInput(_) | crate::handoff::ToolOutcome::SummaryFailed(_) => {
                Ok(ToolResult::error(outcome.as_text()))
            }
        }
    }
}
