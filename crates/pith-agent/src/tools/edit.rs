use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::builtin::BuiltinTools;
use super::{Tool, ToolResult};

pub struct EditTool {
    pub builtin: Arc<BuiltinTools>,
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "edit"
    }

    fn description(&self) -> &str {
        "Replace the first occurrence of `old` with `new` in a workspace file."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "old": { "type": "string" },
                "new": { "type": "string" },
            },
            "required": ["path", "old", "new"],
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let (Some(path), Some(old), Some(new)) = (
            input.get("path").and_then(|v| v.as_str()),
            input.get("old").and_then(|v| v.as_str()),
            input.get("new").and_then(|v| v.as_str()),
        ) else {
            return ToolResult::error("missing required field 'path', 'old', or 'new'");
        };
        match self.builtin.edit(path, old, new) {
            Ok(message) => ToolResult::success(message),
            Err(e) => ToolResult::error(e),
        }
    }
}
