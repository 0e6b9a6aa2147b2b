use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Default cap on a single textual tool output, per §4.4.3.
pub const DEFAULT_TOOL_OUTPUT_MAX_CHARS: usize = 8_000;
/// `chat()` loads this many most-recent messages from the Store, per §4.4.4 step 2.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
/// Top-N memory entries retrieved per turn, per §4.4.4 step 3.
pub const DEFAULT_MEMORY_SEARCH_LIMIT: usize = 8;
/// Secret back-channel wait timeout, per §4.4.5.
pub const SECRET_REQUEST_TIMEOUT_SECS: u64 = 60;
/// Remote-tool JSON-RPC call timeout, per §4.3.
pub const REMOTE_TOOL_TIMEOUT_SECS: u64 = 30;
/// Tool-call loop iteration cap, per §4.4.4.1 (ambient).
pub const MAX_TOOL_LOOP_ITERATIONS: usize = 25;
/// Default `compact_session` retention, per §4.4.6.
pub const DEFAULT_COMPACT_KEEP: usize = 50;

/// Top-level config (`pith.toml` + `PITH_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PithConfig {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Default for PithConfig {
    fn default() -> Self {
        Self {
            workspace: WorkspaceConfig::default(),
            gateway: GatewayConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory holding `memory.db`, `SOUL.md`, `extensions/`, `mcp/`.
    /// The enclosing directory of this root is where `.env` lives.
    #[serde(default = "default_workspace_root")]
    pub root: String,
    /// Remote-tool name prefix, per Design Note §9.1 (`mcp_<server>_<tool>`).
    #[serde(default = "default_remote_prefix")]
    pub remote_tool_prefix: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
            remote_tool_prefix: default_remote_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_memory_search_limit")]
    pub memory_search_limit: usize,
    #[serde(default = "default_tool_output_max_chars")]
    pub tool_output_max_chars: usize,
    #[serde(default = "default_secret_timeout")]
    pub secret_timeout_secs: u64,
    #[serde(default = "default_remote_timeout")]
    pub remote_tool_timeout_secs: u64,
    #[serde(default = "default_max_iterations")]
    pub max_tool_loop_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            history_limit: default_history_limit(),
            memory_search_limit: default_memory_search_limit(),
            tool_output_max_chars: default_tool_output_max_chars(),
            secret_timeout_secs: default_secret_timeout(),
            remote_tool_timeout_secs: default_remote_timeout(),
            max_tool_loop_iterations: default_max_iterations(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_remote_prefix() -> String {
    "mcp".to_string()
}
fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}
fn default_memory_search_limit() -> usize {
    DEFAULT_MEMORY_SEARCH_LIMIT
}
fn default_tool_output_max_chars() -> usize {
    DEFAULT_TOOL_OUTPUT_MAX_CHARS
}
fn default_secret_timeout() -> u64 {
    SECRET_REQUEST_TIMEOUT_SECS
}
fn default_remote_timeout() -> u64 {
    REMOTE_TOOL_TIMEOUT_SECS
}
fn default_max_iterations() -> usize {
    MAX_TOOL_LOOP_ITERATIONS
}
fn default_workspace_root() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.pith/workspace", home)
}

impl PithConfig {
    /// Load config from a TOML file with `PITH_*` env var overrides.
    ///
    /// Checks in order: explicit path argument, then `~/.pith/pith.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: PithConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PITH_").split("_"))
            .extract()
            .map_err(|e| crate::error::PithError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.pith/pith.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = PithConfig::default();
        assert_eq!(config.gateway.port, DEFAULT_PORT);
        assert_eq!(config.agent.history_limit, 20);
        assert_eq!(config.agent.memory_search_limit, 8);
        assert_eq!(config.agent.tool_output_max_chars, 8_000);
        assert_eq!(config.agent.secret_timeout_secs, 60);
        assert_eq!(config.agent.remote_tool_timeout_secs, 30);
        assert_eq!(config.workspace.remote_tool_prefix, "mcp");
    }
}
