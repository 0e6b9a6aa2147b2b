use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::builtin::BuiltinTools;
use super::{Tool, ToolResult};

pub struct WriteTool {
    pub builtin: Arc<BuiltinTools>,
}

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "write"
    }

    fn description(&self) -> &str {
        "Write content to a file in the workspace, creating parent directories as needed."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "content": { "type": "string" },
            },
            "required": ["path", "content"],
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let (Some(path), Some(content)) = (
            input.get("path").and_then(|v| v.as_str()),
            input.get("content").and_then(|v| v.as_str()),
        ) else {
            return ToolResult::error("missing required field 'path' or 'content'");
        };
        match self.builtin.write(path, content) {
            Ok(message) => ToolResult::success(message),
            Err(e) => ToolResult::error(e),
        }
    }
}
