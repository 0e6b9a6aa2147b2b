use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::builtin::BuiltinTools;
use super::{Tool, ToolResult};

pub struct MemorySearchTool {
    pub builtin: Arc<BuiltinTools>,
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search long-term memory for entries relevant to a query, most relevant first."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "limit": { "type": "integer", "default": 8 },
            },
            "required": ["query"],
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let Some(query) = input.get("query").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required field 'query'");
        };
        let limit = input.get("limit").and_then(|v| v.as_u64()).unwrap_or(8) as usize;
        match self.builtin.memory_search(query, limit) {
            Ok(entries) => ToolResult::success(entries),
            Err(e) => ToolResult::error(e),
        }
    }
}
