//! Workspace path sandboxing, shared by every built-in tool that touches the
//! filesystem (`read`, `write`, `edit`, `list_dir`, `file_search`, and the
//! callbacks injected into `run_python`).

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
#[error("path escapes workspace: {0}")]
pub struct SandboxViolation(pub String);

/// Join `relative` onto `workspace_root`, canonicalize, and reject anything
/// that doesn't resolve inside the canonical workspace root.
///
/// Canonicalization requires the path to exist for directories, but for files
/// about to be written the parent must exist and be canonicalized instead;
/// callers writing new files should canonicalize the parent and re-append the
/// file name, which `resolve_for_write` does.
pub fn resolve_readable(workspace_root: &Path, relative: &str) -> Result<PathBuf, SandboxViolation> {
    let root = canonical_root(workspace_root)?;
    let joined = root.join(relative);
    let canonical = joined
        .canonicalize()
        .map_err(|_| SandboxViolation(relative.to_string()))?;
    ensure_within(&root, &canonical, relative)
}

/// Like `resolve_readable`, but tolerant of the final path component not yet
/// existing (the common case for `write`/`edit` creating a new file). The
/// parent directory must already exist and canonicalize inside the workspace.
pub fn resolve_for_write(workspace_root: &Path, relative: &str) -> Result<PathBuf, SandboxViolation> {
    let root = canonical_root(workspace_root)?;
    let joined = root.join(relative);
    let parent = joined
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| root.clone());
    std::fs::create_dir_all(&parent).map_err(|_| SandboxViolation(relative.to_string()))?;
    let canonical_parent = parent
        .canonicalize()
        .map_err(|_| SandboxViolation(relative.to_string()))?;
    let file_name = joined
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| SandboxViolation(relative.to_string()))?;
    let candidate = canonical_parent.join(file_name);
    ensure_within(&root, &candidate, relative)
}

fn canonical_root(workspace_root: &Path) -> Result<PathBuf, SandboxViolation> {
    workspace_root
        .canonicalize()
        .map_err(|_| SandboxViolation("<workspace root>".to_string()))
}

fn ensure_within(root: &Path, candidate: &Path, relative: &str) -> Result<PathBuf, SandboxViolation> {
    if candidate.starts_with(root) {
        Ok(candidate.to_path_buf())
    } else {
        Err(SandboxViolation(relative.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn allows_path_within_workspace() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hi").unwrap();
        let resolved = resolve_readable(dir.path(), "a.txt").unwrap();
        assert!(resolved.ends_with("a.txt"));
    }

    #[test]
    fn rejects_escaping_path() {
        let dir = TempDir::new().unwrap();
        let err = resolve_readable(dir.path(), "../../etc/passwd").unwrap_err();
        assert!(err.to_string().starts_with("path escapes workspace"));
    }

    #[test]
    fn write_creates_missing_parents_inside_workspace() {
        let dir = TempDir::new().unwrap();
        let resolved = resolve_for_write(dir.path(), "nested/dir/file.txt").unwrap();
        assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn write_rejects_escaping_parent() {
        let dir = TempDir::new().unwrap();
        let err = resolve_for_write(dir.path(), "../outside.txt").unwrap_err();
        assert!(err.to_string().starts_with("path escapes workspace"));
    }
}
