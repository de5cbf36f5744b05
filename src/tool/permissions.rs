use crate::tool::types::{DangerLevel, Tool, ToolMode};
use std::collections::HashSet;

/// Manages permissions for tool execution.
#[derive(Debug, Clone, Default)]
pub struct PermissionMatrix {
    mode: ToolMode,
    allowed_this_session: HashSet<String>,
}

impl PermissionMatrix {
    #[must_use]
    pub fn new(mode: ToolMode) -> Self {
        Self {
            mode,
            allowed_this_session: HashSet::new(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ToolMode) {
        self.mode = mode;
    }

    pub fn allow_session(&mut self, tool_name: &str) {
        self.allowed_this_session.insert(tool_name.to_string());
    }

    pub fn check_permission(&self, tool: &dyn Tool) -> PermissionStatus {
        if self.allowed_this_session.contains(tool.name()) {
            return PermissionStatus::Allowed;
        }
        match self.mode {
            ToolMode::Agi => PermissionStatus::Allowed,
            ToolMode::Write => {
                if tool.danger_level() == DangerLevel::Safe {
                    PermissionStatus::Allowed
                } else {
                    PermissionStatus::NeedsApproval
                }
            }
            ToolMode::Read => {
                if tool.danger_level() == DangerLevel::Safe {
                    PermissionStatus::Allowed
                } else {
                    PermissionStatus::Denied("mutations are blocked in read mode".to_string())
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PermissionStatus {
    Allowed,
    NeedsApproval,
    Denied(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::types::{ToolContext, ToolError, ToolResult};
    use async_trait::async_trait;

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
            serde_json::json!({})
        }
        fn danger_level(&self) -> DangerLevel {
            self.danger
        }
        async fn execute(&self, _: serde_json::Value, _: &ToolContext) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok("ok"))
        }
    }

    #[test]
    fn test_agi_always_allowed() {
        let matrix = PermissionMatrix::new(ToolMode::Agi);
        let tool = MockTool {
            name: "write".into(),
            danger: DangerLevel::Restricted,
        };
        assert_eq!(matrix.check_permission(&tool), PermissionStatus::Allowed);
    }

    #[test]
    fn test_read_mode_denies_restricted() {
        let matrix = PermissionMatrix::new(ToolMode::Read);
        let tool = MockTool {
            name: "write".into(),
            danger: DangerLevel::Restricted,
        };
        assert!(matches!(matrix.check_permission(&tool), PermissionStatus::Denied(_)));
    }

    #[test]
    fn test_write_mode_needs_approval_for_restricted() {
        let matrix = PermissionMatrix::new(ToolMode::Write);
        let tool = MockTool {
            name: "write".into(),
            danger: DangerLevel::Restricted,
        };
        assert_eq!(matrix.check_permission(&tool), PermissionStatus::NeedsApproval);
    }

    #[test]
    fn test_session_allow_overrides_mode() {
        let mut matrix = PermissionMatrix::new(ToolMode::Write);
        matrix.allow_session("write");
        let tool = MockTool {
            name: "write".into(),
            danger: DangerLevel::Restricted,
        };
        assert_eq!(matrix.check_permission(&tool), PermissionStatus::Allowed);
    }
}
