use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::builtin::BuiltinTools;
use super::{Tool, ToolResult};

pub struct SetProfileTool {
    pub builtin: Arc<BuiltinTools>,
}

#[async_trait]
impl Tool for SetProfileTool {
    fn name(&self) -> &str {
        "set_profile"
    }

    fn description(&self) -> &str {
        "Set a field on the agent's or the user's profile (e.g. name)."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "profile_type": { "type": "string", "enum": ["agent", "user"] },
                "key": { "type": "string" },
                "value": { "type": "string" },
            },
            "required": ["profile_type", "key", "value"],
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let (Some(profile_type), Some(key), Some(value)) = (
            input.get("profile_type").and_then(|v| v.as_str()),
            input.get("key").and_then(|v| v.as_str()),
            input.get("value").and_then(|v| v.as_str()),
        ) else {
            return ToolResult::error("missing required field 'profile_type', 'key', or 'value'");
        };
        match self.builtin.set_profile(profile_type, key, value) {
            Ok(message) => ToolResult::success(message),
            Err(e) => ToolResult::error(e),
        }
    }
}
