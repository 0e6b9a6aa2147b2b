use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::builtin::BuiltinTools;
use super::{Tool, ToolResult};

pub struct MemorySaveTool {
    pub builtin: Arc<BuiltinTools>,
}

#[async_trait]
impl Tool for MemorySaveTool {
    fn name(&self) -> &str {
        "memory_save"
    }

    fn description(&self) -> &str {
        "Save a durable fact to long-term memory, for later recall via memory_search."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "content": { "type": "string" },
                "kind": { "type": "string", "default": "durable" },
                "tags": { "type": "string" },
            },
            "required": ["content"],
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let Some(content) = input.get("content").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required field 'content'");
        };
        let kind = input.get("kind").and_then(|v| v.as_str()).unwrap_or("durable");
        let tags = input.get("tags").and_then(|v| v.as_str());
        match self.builtin.memory_save(content, kind, tags) {
            Ok(message) => ToolResult::success(message),
            Err(e) => ToolResult::error(e),
        }
    }
}
