use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::builtin::BuiltinTools;
use super::{Tool, ToolResult};

pub struct ToolCallTool {
    pub builtin: Arc<BuiltinTools>,
}

#[async_trait]
impl Tool for ToolCallTool {
    fn name(&self) -> &str {
        "tool_call"
    }

    fn description(&self) -> &str {
        "Invoke an extension tool or a remote MCP tool by its full name."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "args": { "type": "object" },
            },
            "required": ["name"],
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let Some(name) = input.get("name").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required field 'name'");
        };
        let args = input.get("args").cloned().unwrap_or_else(|| json!({}));
        match self.builtin.tool_call(name, args).await {
            Ok(output) => ToolResult::success(self.builtin.truncate_output(output)),
            Err(e) => ToolResult::error(e),
        }
    }
}
