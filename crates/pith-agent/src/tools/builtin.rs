use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use tracing::{error, info};

use pith_core::sandbox::{resolve_for_write, resolve_readable};
use pith_core::types::ProfileType;
use pith_extensions::ExtensionRegistry;
use pith_mcp::McpRegistry;
use pith_store::types::MemorySource;
use pith_store::Store;

use crate::env_file;
use crate::secrets::SecretBroker;

/// Fires synchronously when `store_secret` needs the client to prompt the
/// user; the actual SSE `secret_request` frame send happens inside this
/// closure (non-blocking, per §4.5.1). Fresh per chat call.
pub type SecretRequestCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Shared state behind every built-in tool, per §4.4.3.2 (Design Note §9
/// "Closure-based per-turn agent → explicit builder"): holds everything that
/// must live for the process lifetime, so the per-turn `Tool` wrapper structs
/// stay cheap.
pub struct BuiltinTools {
    pub store: Arc<Store>,
    pub workspace_root: PathBuf,
    pub extensions: Arc<ExtensionRegistry>,
    pub mcp: Arc<McpRegistry>,
    pub secrets: Arc<SecretBroker>,
    pub remote_tool_prefix: String,
    pub tool_output_max_chars: usize,
}

impl BuiltinTools {
    pub fn truncate_output(&self, text: String) -> String {
        if text.chars().count() <= self.tool_output_max_chars {
            return text;
        }
        let mut truncated: String = text.chars().take(self.tool_output_max_chars).collect();
        truncated.push_str("...");
        truncated
    }

    pub fn read(&self, path: &str) -> Result<String, String> {
        let resolved = resolve_readable(&self.workspace_root, path).map_err(|e| e.to_string())?;
        std::fs::read_to_string(&resolved).map_err(|e| format!("failed to read '{path}': {e}"))
    }

    pub fn write(&self, path: &str, content: &str) -> Result<String, String> {
        let resolved = resolve_for_write(&self.workspace_root, path).map_err(|e| e.to_string())?;
        std::fs::write(&resolved, content).map_err(|e| format!("failed to write '{path}': {e}"))?;
        Ok(format!("written {}", resolved.display()))
    }

    pub fn edit(&self, path: &str, old: &str, new: &str) -> Result<String, String> {
        let resolved = resolve_readable(&self.workspace_root, path).map_err(|e| e.to_string())?;
        let content = std::fs::read_to_string(&resolved).map_err(|e| format!("failed to read '{path}': {e}"))?;
        let Some(offset) = content.find(old) else {
            return Err("old content not found".to_string());
        };
        let mut updated = String::with_capacity(content.len());
        updated.push_str(&content[..offset]);
        updated.push_str(new);
        updated.push_str(&content[offset + old.len()..]);
        std::fs::write(&resolved, updated).map_err(|e| format!("failed to write '{path}': {e}"))?;
        Ok(format!("edited {}", resolved.display()))
    }

    pub fn list_dir(&self, path: &str, glob: Option<&str>, recursive: bool) -> Result<String, String> {
        let root = if path.is_empty() || path == "." {
            self.workspace_root.clone()
        } else {
            resolve_readable(&self.workspace_root, path).map_err(|e| e.to_string())?
        };
        let mut entries = Vec::new();
        collect_entries(&root, &root, recursive, &mut entries).map_err(|e| e.to_string())?;
        let mut entries: Vec<String> = entries
            .into_iter()
            .filter(|rel| glob.map(|g| match_glob(g, rel)).unwrap_or(true))
            .collect();
        entries.sort();
        Ok(self.truncate_output(entries.join("\n")))
    }

    pub fn file_search(
        &self,
        pattern: &str,
        glob: &str,
        recursive: bool,
        literal: bool,
        max_results: usize,
    ) -> Result<String, String> {
        let regex_source = if literal { regex::escape(pattern) } else { pattern.to_string() };
        let re = Regex::new(&regex_source).map_err(|e| format!("invalid regex: {e}"))?;

        let mut files = Vec::new();
        collect_entries(&self.workspace_root, &self.workspace_root, recursive, &mut files)
            .map_err(|e| e.to_string())?;
        files.retain(|rel| !rel.ends_with('/') && match_glob(glob, rel));
        files.sort();

        let mut matches = Vec::new();
        'outer: for rel in files {
            let full = self.workspace_root.join(&rel);
            let Ok(bytes) = std::fs::read(&full) else { continue };
            if bytes[..bytes.len().min(8192)].contains(&0u8) {
                continue;
            }
            let Ok(text) = std::str::from_utf8(&bytes) else { continue };
            for (line_no, line) in text.lines().enumerate() {
                if re.is_match(line) {
                    matches.push(format!("{rel}:{}: {line}", line_no + 1));
                    if matches.len() >= max_results {
                        break 'outer;
                    }
                }
            }
        }
        Ok(self.truncate_output(matches.join("\n")))
    }

    pub fn run_python(&self, code: &str) -> Result<String, String> {
        crate::tools::run_python::run_sandboxed(self, code)
    }

    pub fn memory_save(&self, content: &str, kind: &str, tags: Option<&str>) -> Result<String, String> {
        let id = self
            .store
            .memory_save(content, kind, tags, MemorySource::UserSaid)
            .map_err(|e| e.to_string())?;
        Ok(format!("memory_saved:{id}"))
    }

    pub fn memory_search(&self, query: &str, limit: usize) -> Result<String, String> {
        let entries = self.store.memory_search(query, limit).map_err(|e| e.to_string())?;
        if entries.is_empty() {
            return Ok("[]".to_string());
        }
        serde_json::to_string(&entries).map_err(|e| e.to_string())
    }

    pub fn set_profile(&self, profile_type: &str, key: &str, value: &str) -> Result<String, String> {
        let profile_type: ProfileType = profile_type.parse().map_err(|_| {
            format!("invalid profile_type '{profile_type}', expected 'agent' or 'user'")
        })?;
        self.store.set_profile(profile_type, key, value).map_err(|e| e.to_string())?;
        Ok(format!("set {profile_type} {key}"))
    }

    pub async fn tool_call(&self, name: &str, args: serde_json::Value) -> Result<String, String> {
        info!(tool = %name, "tool_call dispatch");
        let remote_prefix_dash = format!("{}_", self.remote_tool_prefix);
        let result = if name.starts_with(&remote_prefix_dash) {
            self.mcp.call(name, args).await.map_err(|e| e.as_tool_result())
        } else if self.extensions.has_tool(name) {
            self.extensions.call_tool(name, &args).map_err(|e| e.to_string())
        } else {
            return Err(format!("unknown tool: {name}"));
        };
        if let Err(ref e) = result {
            error!(tool = %name, error = %e, "tool_call failed");
        }
        result
    }

    pub fn list_secrets(&self) -> Result<String, String> {
        let path = env_file::env_path(&self.workspace_root);
        let keys = env_file::list_keys(&path).map_err(|e| e.to_string())?;
        serde_json::to_string(&keys).map_err(|e| e.to_string())
    }

    /// Never returns `Err` — per §4.4.5, timeouts/missing-callback are
    /// surfaced as tool-result text, not an exception.
    pub async fn store_secret(&self, name: &str, on_secret_request: Option<&SecretRequestCallback>) -> String {
        let Some(callback) = on_secret_request else {
            return "error: non-interactive session — no secret callback installed".to_string();
        };
        let request_id = SecretBroker::generate_request_id();
        let pending = self.secrets.register(&request_id);
        callback(&request_id, name);

        match pending.wait().await {
            Some(value) => {
                let path = env_file::env_path(&self.workspace_root);
                if let Err(e) = env_file::set_value(&path, name, &value) {
                    return format!("error: failed to persist secret: {e}");
                }
                std::env::set_var(name, &value);
                format!("stored secret '{name}'")
            }
            None => "error: timed out waiting for secret input".to_string(),
        }
    }
}

/// Collects workspace-relative entries under `dir`, each suffixed with `/`
/// for directories, per §4.4.3's `list_dir` line format.
fn collect_entries(root: &Path, dir: &Path, recursive: bool, out: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let rel = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");
        if path.is_dir() {
            out.push(format!("{rel}/"));
            if recursive {
                collect_entries(root, &path, recursive, out)?;
            }
        } else {
            out.push(rel);
        }
    }
    Ok(())
}

/// Minimal glob matcher: `*` → any run of characters, `?` → any one
/// character, everything else literal.
fn match_glob(pattern: &str, candidate: &str) -> bool {
    let mut regex_source = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => regex_source.push_str(".*"),
            '?' => regex_source.push('.'),
            other => regex_source.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex_source.push('$');
    Regex::new(&regex_source).map(|re| re.is_match(candidate)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn builtin(dir: &Path) -> BuiltinTools {
        BuiltinTools {
            store: Arc::new(Store::open_in_memory().unwrap()),
            workspace_root: dir.to_path_buf(),
            extensions: Arc::new(ExtensionRegistry::new("mcp")),
            mcp: Arc::new(McpRegistry::new("mcp")),
            secrets: Arc::new(SecretBroker::new()),
            remote_tool_prefix: "mcp".to_string(),
            tool_output_max_chars: 8_000,
        }
    }

    #[test]
    fn write_then_read_roundtrips() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        tools.write("note.txt", "hello").unwrap();
        assert_eq!(tools.read("note.txt").unwrap(), "hello");
    }

    #[test]
    fn read_rejects_path_escaping_workspace() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        let err = tools.read("../../etc/passwd").unwrap_err();
        assert!(err.starts_with("path escapes workspace"));
    }

    #[test]
    fn edit_replaces_first_occurrence() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        tools.write("a.txt", "foo bar foo").unwrap();
        tools.edit("a.txt", "foo", "baz").unwrap();
        assert_eq!(tools.read("a.txt").unwrap(), "baz bar foo");
    }

    #[test]
    fn edit_missing_old_content_is_an_error() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        tools.write("a.txt", "hello").unwrap();
        let err = tools.edit("a.txt", "nope", "x").unwrap_err();
        assert_eq!(err, "old content not found");
    }

    #[test]
    fn list_dir_filters_by_glob() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        tools.write("a.rs", "").unwrap();
        tools.write("b.txt", "").unwrap();
        let listing = tools.list_dir(".", Some("*.rs"), false).unwrap();
        assert_eq!(listing, "a.rs");
    }

    #[test]
    fn file_search_finds_literal_matches() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        tools.write("a.txt", "alpha\nbeta\n").unwrap();
        let result = tools.file_search("beta", "*", true, true, 50).unwrap();
        assert!(result.contains("a.txt:2: beta"));
    }

    #[test]
    fn file_search_invalid_regex_is_an_error() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        let err = tools.file_search("[", "*", true, false, 50).unwrap_err();
        assert!(err.starts_with("invalid regex"));
    }

    #[test]
    fn memory_search_returns_json_array() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        tools.memory_save("likes tea", "durable", None).unwrap();
        let result = tools.memory_search("tea", 8).unwrap();
        assert!(result.starts_with('['));
        assert!(result.contains("likes tea"));
    }

    #[test]
    fn memory_search_empty_returns_empty_array_literal() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        assert_eq!(tools.memory_search("nothing", 8).unwrap(), "[]");
    }

    #[test]
    fn set_profile_rejects_invalid_profile_type() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        let err = tools.set_profile("robot", "name", "x").unwrap_err();
        assert!(err.contains("invalid profile_type"));
    }

    #[tokio::test]
    async fn tool_call_unknown_tool_is_an_error() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        let err = tools.tool_call("nope", serde_json::json!({})).await.unwrap_err();
        assert_eq!(err, "unknown tool: nope");
    }

    #[tokio::test]
    async fn store_secret_without_callback_reports_non_interactive() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        let result = tools.store_secret("X", None).await;
        assert!(result.starts_with("error: non-interactive"));
    }

    #[tokio::test]
    async fn store_secret_with_callback_persists_and_never_leaks_value() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        let secrets = tools.secrets.clone();
        let callback: SecretRequestCallback = Arc::new(move |request_id, _name| {
            let secrets = secrets.clone();
            let request_id = request_id.to_string();
            tokio::spawn(async move {
                secrets.provide(&request_id, "sekret-value".to_string());
            });
        });
        let result = tools.store_secret("X", Some(&callback)).await;
        assert_eq!(result, "stored secret 'X'");
        assert!(!result.contains("sekret-value"));
        let env_path = env_file::env_path(&tools.workspace_root);
        let content = std::fs::read_to_string(&env_path).unwrap();
        assert!(content.contains("X=sekret-value"));
    }

    #[test]
    fn list_secrets_never_reveals_values() {
        let dir = TempDir::new().unwrap();
        let tools = builtin(dir.path());
        let env_path = env_file::env_path(dir.path());
        std::fs::write(&env_path, "API_KEY=topsecret\n").unwrap();
        let result = tools.list_secrets().unwrap();
        assert_eq!(result, "[\"API_KEY\"]");
        assert!(!result.contains("topsecret"));
    }
}
