use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::builtin::BuiltinTools;
use super::{Tool, ToolResult};

pub struct ListDirTool {
    pub builtin: Arc<BuiltinTools>,
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List entries under a workspace directory, optionally filtered by glob and recursed."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "default": "." },
                "glob": { "type": "string" },
                "recursive": { "type": "boolean", "default": false },
            },
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let path = input.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let glob = input.get("glob").and_then(|v| v.as_str());
        let recursive = input.get("recursive").and_then(|v| v.as_bool()).unwrap_or(false);
        match self.builtin.list_dir(path, glob, recursive) {
            Ok(listing) => ToolResult::success(listing),
            Err(e) => ToolResult::error(e),
        }
    }
}
