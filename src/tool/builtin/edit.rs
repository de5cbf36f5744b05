use crate::tool::builtin::validate_path_within_working_dir;
use crate::tool::{DangerLevel, Tool, ToolContext, ToolError, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::path::Path;

pub struct EditTool;

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "edit"
    }

    fn description(&self) -> &str {
        "Edit a file by replacing exact text. Use for surgical edits instead of rewriting entire files."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path to the file to modify"
                },
                "old_string": {
                    "type": "string",
                    "description": "The exact text to replace (must exist in file)"
                },
                "new_string": {
                    "type": "string",
                    "description": "The replacement text (must differ from old_string)"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false, requires unique match)"
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    fn danger_level(&self) -> DangerLevel {
        DangerLevel::Restricted
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let path_str = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs("path is required".to_string()))?;
        let old_string = args
            .get("old_string")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs("old_string is required".to_string()))?;
        let new_string = args
            .get("new_string")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArgs("new_string is required".to_string()))?;
        let replace_all = args.get("replace_all").and_then(serde_json::Value::as_bool).unwrap_or(false);

        if old_string == new_string {
            return Err(ToolError::InvalidArgs("old_string and new_string must be different".to_string()));
        }
        if old_string.is_empty() {
            return Err(ToolError::InvalidArgs(
                "old_string cannot be empty; use the write tool to create new files".to_string(),
            ));
        }

        let validated_path = validate_path_within_working_dir(Path::new(path_str), &ctx.working_dir)?;
        if !validated_path.exists() {
            return Err(ToolError::InvalidArgs(format!(
                "file not found: {path_str}; use the write tool to create new files"
            )));
        }

        let content = tokio::fs::read_to_string(&validated_path)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to read file: {e}")))?;

        let count = content.matches(old_string).count();
        if count == 0 {
            return Err(ToolError::InvalidArgs(format!("text not found in file: {old_string:?}")));
        }
        if count > 1 && !replace_all {
            return Err(ToolError::InvalidArgs(format!(
                "text appears {count} times; use replace_all: true or provide more surrounding context"
            )));
        }

        let new_content = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };

        tokio::fs::write(&validated_path, new_content)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to write file: {e}")))?;

        Ok(ToolResult::ok(format!("edited {path_str} ({count} replacement(s))")))
    }
}
