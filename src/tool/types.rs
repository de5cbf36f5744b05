use crate::provider::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ToolContext {
    pub working_dir: PathBuf,
    pub session_id: String,
    pub session_path: PathBuf,
    pub messages: Arc<Vec<Message>>,
    pub abort_signal: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    #[must_use]
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> serde_json::Value;

    async fn execute(
        &self,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError>;

    fn danger_level(&self) -> DangerLevel {
        DangerLevel::Restricted
    }
}

/// Classification of tools based on their potential impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DangerLevel {
    /// Tool is safe to run (e.g. read).
    Safe,
    /// Tool has side effects (e.g. write, edit).
    Restricted,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

/// User's response to an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalResponse {
    Yes,
    No,
    AlwaysSession,
}

/// Interface for handling tool approvals. Usually implemented by the UI surface.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    async fn ask_approval(&self, tool_name: &str, args: &serde_json::Value) -> ApprovalResponse;
}

/// The active execution mode of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ToolMode {
    /// Only safe tools (read-only) are allowed.
    Read,
    /// Standard interactive mode with prompts for restricted tools.
    #[default]
    Write,
    /// Full autonomy, no prompts.
    Agi,
}
