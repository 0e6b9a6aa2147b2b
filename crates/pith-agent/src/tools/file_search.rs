use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::builtin::BuiltinTools;
use super::{Tool, ToolResult};

pub struct FileSearchTool {
    pub builtin: Arc<BuiltinTools>,
}

#[async_trait]
impl Tool for FileSearchTool {
    fn name(&self) -> &str {
        "file_search"
    }

    fn description(&self) -> &str {
        "Search workspace files for a regex (or literal) pattern, grep-style."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string" },
                "glob": { "type": "string", "default": "*" },
                "recursive": { "type": "boolean", "default": true },
                "literal": { "type": "boolean", "default": false },
                "max_results": { "type": "integer", "default": 50 },
            },
            "required": ["pattern"],
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let Some(pattern) = input.get("pattern").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required field 'pattern'");
        };
        let glob = input.get("glob").and_then(|v| v.as_str()).unwrap_or("*");
        let recursive = input.get("recursive").and_then(|v| v.as_bool()).unwrap_or(true);
        let literal = input.get("literal").and_then(|v| v.as_bool()).unwrap_or(false);
        let max_results = input.get("max_results").and_then(|v| v.as_u64()).unwrap_or(50) as usize;
        match self.builtin.file_search(pattern, glob, recursive, literal, max_results) {
            Ok(matches) => ToolResult::success(matches),
            Err(e) => ToolResult::error(e),
        }
    }
}
