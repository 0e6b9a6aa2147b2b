use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::builtin::BuiltinTools;
use super::{Tool, ToolResult};

pub struct ListSecretsTool {
    pub builtin: Arc<BuiltinTools>,
}

#[async_trait]
impl Tool for ListSecretsTool {
    fn name(&self) -> &str {
        "list_secrets"
    }

    fn description(&self) -> &str {
        "List the names of secrets available in the workspace's .env file. Never reveals values."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _input: serde_json::Value) -> ToolResult {
        match self.builtin.list_secrets() {
            Ok(names) => ToolResult::success(names),
            Err(e) => ToolResult::error(e),
        }
    }
}
