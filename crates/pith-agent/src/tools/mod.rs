//! Built-in tools, per §4.4.3. Grounded in the source project's
//! `skynet-agent/src/tools/mod.rs` `Tool` trait and per-file tool layout.

pub mod builtin;
pub mod edit;
pub mod file_search;
pub mod list_dir;
pub mod list_secrets;
pub mod memory_save;
pub mod memory_search;
pub mod read;
pub mod run_python;
pub mod set_profile;
pub mod store_secret;
pub mod tool_call;
pub mod tool_loop;
pub mod write;

use async_trait::async_trait;

use crate::provider::ToolDefinition;

#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: false }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { content: message.into(), is_error: true }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;
    async fn execute(&self, input: serde_json::Value) -> ToolResult;
}

pub fn to_definitions(tools: &[Box<dyn Tool>]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect()
}
