use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// A single `<workspace>/mcp/<name>.toml` file's contents.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// A tool discovered from a remote server's `tools/list` response.
#[derive(Debug, Clone)]
pub struct RemoteTool {
    pub server: String,
    pub tool_name: String,
    pub description: String,
    pub input_schema: Value,
}

impl RemoteTool {
    /// `<remote-prefix>_<server>_<tool>`, per §4.3.
    pub fn full_name(&self, remote_tool_prefix: &str) -> String {
        format!("{}_{}_{}", remote_tool_prefix, self.server, self.tool_name)
    }
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct RpcRequest<'a> {
    pub jsonrpc: &'a str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    #[allow(dead_code)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorEnvelope>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorEnvelope {
    pub code: i64,
    pub message: String,
}
