pub mod builtin;
pub mod permissions;
pub mod types;

pub use permissions::{PermissionMatrix, PermissionStatus};
pub use types::*;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Dispatches tool calls by name, gated by a permission matrix and an
/// optional approval handler for anything not pre-approved.
pub struct ToolOrchestrator {
    tools: HashMap<String, Box<dyn Tool>>,
    permissions: RwLock<PermissionMatrix>,
    approval_handler: Option<Arc<dyn ApprovalHandler>>,
}

impl ToolOrchestrator {
    #[must_use]
    pub fn new(mode: ToolMode) -> Self {
        Self {
            tools: HashMap::new(),
            permissions: RwLock::new(PermissionMatrix::new(mode)),
            approval_handler: None,
        }
    }

    pub fn set_approval_handler(&mut self, handler: Arc<dyn ApprovalHandler>) {
        self.approval_handler = Some(handler);
    }

    pub fn register_tool(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub async fn call_tool(
        &self,
        name: &str,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::ExecutionFailed(format!("tool not found: {name}")))?;

        let status = {
            let perms = self.permissions.read().await;
            perms.check_permission(tool.as_ref())
        };

        match status {
            PermissionStatus::Allowed => tool.execute(args, ctx).await,
            PermissionStatus::NeedsApproval => {
                let Some(handler) = &self.approval_handler else {
                    return Err(ToolError::PermissionDenied(
                        "approval required but no handler registered".to_string(),
                    ));
                };
                match handler.ask_approval(name, &args).await {
                    ApprovalResponse::Yes => tool.execute(args, ctx).await,
                    ApprovalResponse::No => Err(ToolError::PermissionDenied(
                        "user rejected tool execution".to_string(),
                    )),
                    ApprovalResponse::AlwaysSession => {
                        self.permissions.write().await.allow_session(name);
                        tool.execute(args, ctx).await
                    }
                }
            }
            PermissionStatus::Denied(reason) => Err(ToolError::PermissionDenied(reason)),
        }
    }

    pub fn list_tools(&self) -> Vec<&dyn Tool> {
        self.tools.values().map(AsRef::as_ref).collect()
    }

    pub async fn set_tool_mode(&self, mode: ToolMode) {
        self.permissions.write().await.set_mode(mode);
    }

    pub async fn tool_mode(&self) -> ToolMode {
        self.permissions.read().await.mode()
    }

    /// Register the built-in file tools plus the handoff and session-query
    /// tools. `store` backs `session_query`; `engine` backs `handoff`.
    #[must_use]
    pub fn with_builtins(
        mode: ToolMode,
        engine: Arc<crate::handoff::Engine>,
        store: Arc<crate::session::SessionStore>,
        client: Arc<dyn crate::provider::ModelClient>,
        model: String,
    ) -> Self {
        let mut orch = Self::new(mode);
        orch.register_tool(Box::new(builtin::ReadTool));
        orch.register_tool(Box::new(builtin::WriteTool));
        orch.register_tool(Box::new(builtin::EditTool));
        orch.register_tool(Box::new(builtin::HandoffTool::new(engine)));
        orch.register_tool(Box::new(builtin::SessionQueryTool::new(store, client, model)));
        orch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct MockTool {
        name: String,
        danger: DangerLevel,
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "mock"
        }
        fn parameters(&self) -> serde_json::Value {
            json!({})
        }
        fn danger_level(&self) -> DangerLevel {
            self.danger
        }
        async fn execute(&self, _: serde_json::Value, _: &ToolContext) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok("ok"))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            working_dir: std::env::temp_dir(),
            session_id: "test".to_string(),
            session_path: std::env::temp_dir().join("test.jsonl"),
            messages: std::sync::Arc::new(Vec::new()),
            abort_signal: tokio_util::sync::CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_errors() {
        let orch = ToolOrchestrator::new(ToolMode::Agi);
        let result = orch.call_tool("nonexistent", json!({}), &ctx()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_agi_mode_allows_restricted() {
        let mut orch = ToolOrchestrator::new(ToolMode::Agi);
        orch.register_tool(Box::new(MockTool {
            name: "danger".into(),
            danger: DangerLevel::Restricted,
        }));
        let result = orch.call_tool("danger", json!({}), &ctx()).await.unwrap();
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn test_read_mode_denies_restricted_without_handler() {
        let mut orch = ToolOrchestrator::new(ToolMode::Read);
        orch.register_tool(Box::new(MockTool {
            name: "danger".into(),
            danger: DangerLevel::Restricted,
        }));
        let result = orch.call_tool("danger", json!({}), &ctx()).await;
        assert!(matches!(result, Err(ToolError::PermissionDenied(_))));
    }
}
