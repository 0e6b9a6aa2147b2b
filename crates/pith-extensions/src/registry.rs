use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{info, instrument, warn};

use crate::error::{ExtensionError, Result};
use crate::lua_runtime::{call_tool_script, verify_channel_entry_points, verify_tool_entry_point};
use crate::types::{ChannelPlugin, ToolPlugin};

/// Snapshot container for discovered extension tools and channels. `refresh()`
/// replaces the whole snapshot atomically under a write lock — readers in
/// flight see either the old or new snapshot, never a partial one, per §5.
pub struct ExtensionRegistry {
    inner: RwLock<Snapshot>,
    remote_tool_prefix: String,
    /// Set by the first `refresh()`; `call_tool`'s injected `read`/`write`/
    /// `edit` callbacks resolve against this root. Empty until then.
    workspace_root: RwLock<PathBuf>,
}

#[derive(Default)]
struct Snapshot {
    tools: HashMap<String, ToolPlugin>,
    channels: HashMap<String, ChannelPlugin>,
}

impl ExtensionRegistry {
    pub fn new(remote_tool_prefix: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(Snapshot::default()),
            remote_tool_prefix: remote_tool_prefix.into(),
            workspace_root: RwLock::new(PathBuf::new()),
        }
    }

    /// Enumerate `<workspace>/extensions/tools/*.lua` and
    /// `<workspace>/extensions/channels/*.lua`, skipping `_`-prefixed
    /// base-names, in sorted name order. Missing directories are treated as
    /// empty (nothing to discover yet), not an error.
    #[instrument(skip(self))]
    pub fn refresh(&self, workspace_root: &Path) -> Result<()> {
        *self.workspace_root.write().unwrap() = workspace_root.to_path_buf();

        let mut tools = HashMap::new();
        for (name, path) in discover(&workspace_root.join("extensions").join("tools"))? {
            if name.starts_with(&format!("{}_", self.remote_tool_prefix)) {
                return Err(ExtensionError::ReservedPrefix(name));
            }
            let source = std::fs::read_to_string(&path)?;
            verify_tool_entry_point(&name, &source)?;
            let description = extract_doc_comment(&source);
            info!(tool = %name, "registered extension tool");
            tools.insert(
                name.clone(),
                ToolPlugin { name, description, path, source },
            );
        }

        let mut channels = HashMap::new();
        for (name, path) in discover(&workspace_root.join("extensions").join("channels"))? {
            let source = std::fs::read_to_string(&path)?;
            verify_channel_entry_points(&name, &source)?;
            info!(channel = %name, "registered extension channel");
            channels.insert(name.clone(), ChannelPlugin { name, path, source });
        }

        let mut snapshot = self.inner.write().unwrap();
        snapshot.tools = tools;
        snapshot.channels = channels;
        Ok(())
    }

    pub fn tool_names(&self) -> Vec<String> {
        let snapshot = self.inner.read().unwrap();
        let mut names: Vec<_> = snapshot.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.inner.read().unwrap().tools.contains_key(name)
    }

    /// Looks up the tool, invokes it, coerces the return value to string.
    /// Unknown tool is an error; argument-shape mismatches surface as a Lua
    /// runtime error wrapped the same way (callers turn both into a tool
    /// error string, never a crash).
    pub fn call_tool(&self, name: &str, args: &serde_json::Value) -> Result<String> {
        let source = {
            let snapshot = self.inner.read().unwrap();
            match snapshot.tools.get(name) {
                Some(plugin) => plugin.source.clone(),
                None => return Err(ExtensionError::UnknownTool(name.to_string())),
            }
        };
        let workspace_root = self.workspace_root.read().unwrap().clone();
        call_tool_script(&source, args, &workspace_root)
    }
}

fn discover(dir: &Path) -> Result<Vec<(String, std::path::PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.starts_with('_') {
            continue;
        }
        found.push((stem.to_string(), path));
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

/// Extract a human-readable description from a leading `--` doc-comment
/// block, mirroring the original's docstring extraction (§4.2.1).
fn extract_doc_comment(source: &str) -> String {
    let mut lines = Vec::new();
    for line in source.lines() {
        let trimmed = line.trim_start();
        if let Some(comment) = trimmed.strip_prefix("--") {
            lines.push(comment.trim().to_string());
        } else if trimmed.is_empty() {
            continue;
        } else {
            break;
        }
    }
    if lines.is_empty() {
        warn!("tool plugin has no leading doc comment; description left empty");
    }
    lines.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_tool(dir: &Path, name: &str, source: &str) {
        let tools_dir = dir.join("extensions").join("tools");
        fs::create_dir_all(&tools_dir).unwrap();
        fs::write(tools_dir.join(format!("{name}.lua")), source).unwrap();
    }

    #[test]
    fn refresh_discovers_tools_and_extracts_description() {
        let dir = TempDir::new().unwrap();
        write_tool(
            dir.path(),
            "greet",
            "-- Greets the caller by name.\nfunction tool(args_json) return 'hi' end",
        );
        let registry = ExtensionRegistry::new("mcp");
        registry.refresh(dir.path()).unwrap();
        assert_eq!(registry.tool_names(), vec!["greet".to_string()]);
        let result = registry.call_tool("greet", &serde_json::json!({})).unwrap();
        assert_eq!(result, "hi");
    }

    #[test]
    fn refresh_skips_underscore_prefixed_files() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "_helper", "function tool(a) return '' end");
        let registry = ExtensionRegistry::new("mcp");
        registry.refresh(dir.path()).unwrap();
        assert!(registry.tool_names().is_empty());
    }

    #[test]
    fn refresh_rejects_remote_prefix_collision() {
        let dir = TempDir::new().unwrap();
        write_tool(dir.path(), "mcp_ping", "function tool(a) return '' end");
        let registry = ExtensionRegistry::new("mcp");
        let err = registry.refresh(dir.path()).unwrap_err();
        assert!(matches!(err, ExtensionError::ReservedPrefix(_)));
    }

    #[test]
    fn call_unknown_tool_is_an_error() {
        let registry = ExtensionRegistry::new("mcp");
        let err = registry.call_tool("nope", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, ExtensionError::UnknownTool(_)));
    }

    #[test]
    fn missing_extensions_directory_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let registry = ExtensionRegistry::new("mcp");
        registry.refresh(dir.path()).unwrap();
        assert!(registry.tool_names().is_empty());
    }
}
