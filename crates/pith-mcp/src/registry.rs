use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::error::{McpError, Result};
use crate::types::{RemoteTool, RpcErrorEnvelope, RpcRequest, RpcResponse, ServerConfig};

/// Snapshot container for discovered remote tools, replaced wholesale on
/// `refresh()` — mirrors `pith_extensions::ExtensionRegistry`'s concurrency
/// model (§5: "tool registries are replaced atomically on refresh()").
pub struct McpRegistry {
    inner: RwLock<Snapshot>,
    remote_tool_prefix: String,
    client: reqwest::Client,
    request_id: AtomicU64,
}

#[derive(Default)]
struct Snapshot {
    tools: HashMap<String, RemoteTool>,
    servers: HashMap<String, ServerConfig>,
}

impl McpRegistry {
    pub fn new(remote_tool_prefix: impl Into<String>) -> Self {
        Self::with_timeout(remote_tool_prefix, Duration::from_secs(30))
    }

    pub fn with_timeout(remote_tool_prefix: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            inner: RwLock::new(Snapshot::default()),
            remote_tool_prefix: remote_tool_prefix.into(),
            client,
            request_id: AtomicU64::new(1),
        }
    }

    /// Enumerate `<workspace>/mcp/*.toml`, perform `tools/list` against each
    /// server, and replace the snapshot wholesale. Per §4.3 step 3, any
    /// per-server failure is a non-fatal warning; the server is skipped and
    /// discovery continues with the rest.
    #[instrument(skip(self))]
    pub async fn refresh(&self, workspace_root: &Path) -> Result<()> {
        let mcp_dir = workspace_root.join("mcp");
        let configs = discover_configs(&mcp_dir)?;

        let mut tools = HashMap::new();
        let mut servers = HashMap::new();
        for (server_name, config) in configs {
            match self.list_server_tools(&server_name, &config).await {
                Ok(server_tools) => {
                    info!(server = %server_name, count = server_tools.len(), "discovered remote tools");
                    for tool in server_tools {
                        tools.insert(tool.full_name(&self.remote_tool_prefix), tool);
                    }
                    servers.insert(server_name, config);
                }
                Err(e) => {
                    warn!(server = %server_name, error = %e, "remote server unreachable, skipping");
                }
            }
        }

        let mut snapshot = self.inner.write().unwrap();
        snapshot.tools = tools;
        snapshot.servers = servers;
        Ok(())
    }

    async fn list_server_tools(&self, server_name: &str, config: &ServerConfig) -> Result<Vec<RemoteTool>> {
        let response = self
            .rpc_call(config, "tools/list", serde_json::json!({}))
            .await?;
        let raw_tools = response
            .get("tools")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut tools = Vec::with_capacity(raw_tools.len());
        for raw in raw_tools {
            let tool_name = raw
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            if tool_name.is_empty() {
                continue;
            }
            let description = raw
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let input_schema = raw
                .get("inputSchema")
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            tools.push(RemoteTool {
                server: server_name.to_string(),
                tool_name,
                description,
                input_schema,
            });
        }
        Ok(tools)
    }

    pub fn tool_names(&self) -> Vec<String> {
        let snapshot = self.inner.read().unwrap();
        let mut names: Vec<_> = snapshot.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_tool(&self, full_name: &str) -> bool {
        self.inner.read().unwrap().tools.contains_key(full_name)
    }

    /// `(full_name, description)` pairs, sorted by name, for the volatile
    /// system-prompt tier (§4.4.2).
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        let snapshot = self.inner.read().unwrap();
        let mut pairs: Vec<(String, String)> = snapshot
            .tools
            .iter()
            .map(|(full_name, tool)| (full_name.clone(), tool.description.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    /// `full_name` is `<prefix>_<server>_<tool>`. Looks up the owning server,
    /// issues `tools/call`, and concatenates `result.content[*].text` with
    /// newlines per §4.3.
    #[instrument(skip(self, args))]
    pub async fn call(&self, full_name: &str, args: serde_json::Value) -> Result<String> {
        let (config, tool_name) = {
            let snapshot = self.inner.read().unwrap();
            let tool = snapshot
                .tools
                .get(full_name)
                .ok_or_else(|| McpError::UnknownServer(full_name.to_string()))?;
            let config = snapshot
                .servers
                .get(&tool.server)
                .ok_or_else(|| McpError::UnknownServer(tool.server.clone()))?
                .clone();
            (config, tool.tool_name.clone())
        };

        let params = serde_json::json!({ "name": tool_name, "arguments": args });
        let response = self.rpc_call(&config, "tools/call", params).await?;

        let text = response
            .get("content")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        Ok(text)
    }

    async fn rpc_call(
        &self,
        config: &ServerConfig,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let mut builder = self.client.post(&config.url).json(&request);
        for (key, value) in &config.headers {
            builder = builder.header(key, interpolate_env(value));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| if e.is_timeout() { McpError::Timeout } else { McpError::Transport(e) })?;
        let body: RpcResponse = response.json().await?;

        if let Some(RpcErrorEnvelope { code, message }) = body.error {
            return Err(McpError::Rpc { code, message });
        }
        Ok(body.result.unwrap_or(serde_json::Value::Null))
    }
}

/// Replace `${VAR}` references with the corresponding environment variable's
/// value; unresolved references are left verbatim.
pub fn interpolate_env(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var_name = &after[..end];
                if let Ok(resolved) = std::env::var(var_name) {
                    out.push_str(&resolved);
                } else {
                    out.push_str("${");
                    out.push_str(var_name);
                    out.push('}');
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str("${");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn discover_configs(mcp_dir: &Path) -> Result<Vec<(String, ServerConfig)>> {
    if !mcp_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in std::fs::read_dir(mcp_dir).map_err(|e| McpError::Config(e.to_string()))? {
        let entry = entry.map_err(|e| McpError::Config(e.to_string()))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let raw = std::fs::read_to_string(&path).map_err(|e| McpError::Config(e.to_string()))?;
        let config: ServerConfig = toml::from_str(&raw).map_err(|e| McpError::Config(e.to_string()))?;
        found.push((stem.to_string(), config));
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn interpolate_env_resolves_known_var() {
        std::env::set_var("PITH_MCP_TEST_TOKEN", "secret123");
        let resolved = interpolate_env("Bearer ${PITH_MCP_TEST_TOKEN}");
        assert_eq!(resolved, "Bearer secret123");
    }

    #[test]
    fn interpolate_env_leaves_unknown_var_verbatim() {
        let resolved = interpolate_env("Bearer ${PITH_MCP_DOES_NOT_EXIST}");
        assert_eq!(resolved, "Bearer ${PITH_MCP_DOES_NOT_EXIST}");
    }

    #[test]
    fn discover_configs_reads_toml_files_sorted() {
        let dir = TempDir::new().unwrap();
        let mcp_dir = dir.path().join("mcp");
        fs::create_dir_all(&mcp_dir).unwrap();
        fs::write(mcp_dir.join("working.toml"), "url = \"http://localhost:9/rpc\"\n").unwrap();
        fs::write(
            mcp_dir.join("broken.toml"),
            "url = \"http://localhost:1/rpc\"\n[headers]\nauthorization = \"Bearer ${X}\"\n",
        )
        .unwrap();

        let configs = discover_configs(&mcp_dir).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].0, "broken");
        assert_eq!(configs[1].0, "working");
        assert_eq!(configs[0].1.headers.get("authorization").unwrap(), "Bearer ${X}");
    }

    #[test]
    fn missing_mcp_directory_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let configs = discover_configs(&dir.path().join("mcp")).unwrap();
        assert!(configs.is_empty());
    }

    #[test]
    fn remote_tool_full_name_uses_prefix_server_tool() {
        let tool = RemoteTool {
            server: "working".to_string(),
            tool_name: "ping".to_string(),
            description: String::new(),
            input_schema: serde_json::Value::Null,
        };
        assert_eq!(tool.full_name("mcp"), "mcp_working_ping");
    }

    #[tokio::test]
    async fn refresh_skips_unreachable_servers_and_keeps_working_ones() {
        let dir = TempDir::new().unwrap();
        let mcp_dir = dir.path().join("mcp");
        fs::create_dir_all(&mcp_dir).unwrap();
        // Port 0 combined with an immediate connection attempt reliably
        // fails to connect, standing in for "unreachable" without relying
        // on a live mock server.
        fs::write(mcp_dir.join("broken.toml"), "url = \"http://127.0.0.1:0/rpc\"\n").unwrap();

        let registry = McpRegistry::with_timeout("mcp", Duration::from_millis(200));
        registry.refresh(dir.path()).await.unwrap();
        assert!(registry.tool_names().is_empty());
    }
}
