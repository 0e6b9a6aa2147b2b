//! `.env` read/write, grounded in the reference Python build's
//! `_set_env_value`/`_load_workspace_env` (`pith/cli.py`, `pith/config.py`):
//! `KEY=VALUE` lines, `#`-prefixed comments, optionally single/double-quoted
//! values. Lives in the directory enclosing the workspace root, per §6.

use std::path::{Path, PathBuf};

pub fn env_path(workspace_root: &Path) -> PathBuf {
    workspace_root
        .parent()
        .map(|p| p.join(".env"))
        .unwrap_or_else(|| workspace_root.join(".env"))
}

/// Key names present in the `.env` file, in file order. Never returns values.
pub fn list_keys(path: &Path) -> std::io::Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            line.split_once('=').map(|(key, _)| key.trim().to_string())
        })
        .collect())
}

/// Replace the `key=` line if present, else append one. Preserves all other
/// lines verbatim.
pub fn set_value(path: &Path, key: &str, value: &str) -> std::io::Result<()> {
    let mut lines: Vec<String> = if path.exists() {
        std::fs::read_to_string(path)?.lines().map(str::to_string).collect()
    } else {
        Vec::new()
    };

    let prefix = format!("{key}=");
    let mut found = false;
    for line in lines.iter_mut() {
        if line.starts_with(&prefix) {
            *line = format!("{key}={value}");
            found = true;
            break;
        }
    }
    if !found {
        lines.push(format!("{key}={value}"));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    std::fs::write(path, out)
}
