use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::builtin::{BuiltinTools, SecretRequestCallback};
use super::{Tool, ToolResult};

/// Per-turn wrapper: the callback varies by call site (SSE vs. channel
/// adapter), so it rides along on the wrapper rather than `BuiltinTools`.
pub struct StoreSecretTool {
    pub builtin: Arc<BuiltinTools>,
    pub on_secret_request: Option<SecretRequestCallback>,
}

#[async_trait]
impl Tool for StoreSecretTool {
    fn name(&self) -> &str {
        "store_secret"
    }

    fn description(&self) -> &str {
        "Request a secret value (e.g. an API key) from the user out-of-band and store it in .env."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"],
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let Some(name) = input.get("name").and_then(|v| v.as_str()) else {
            return ToolResult::error("missing required field 'name'");
        };
        let result = self.builtin.store_secret(name, self.on_secret_request.as_ref()).await;
        if result.starts_with("error:") {
            ToolResult::error(result)
        } else {
            ToolResult::success(result)
        }
    }
}
