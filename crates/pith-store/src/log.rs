use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::json;

use crate::error::Result;

/// Append-only JSON-lines event log at `<workspace>/.pith/logs/events.jsonl`,
/// per §6's persisted-state layout. Created on demand.
pub struct EventLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EventLog {
    pub fn new(workspace_root: &Path) -> Self {
        Self {
            path: workspace_root.join(".pith").join("logs").join("events.jsonl"),
            lock: Mutex::new(()),
        }
    }

    /// Append one JSON line: `{event, level, payload, ts}`.
    pub fn log_event(&self, event: &str, level: &str, payload: serde_json::Value) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = json!({
            "event": event,
            "level": level,
            "payload": payload,
            "ts": chrono::Utc::now().to_rfc3339(),
        });
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&line)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn appends_one_line_per_call() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path());
        log.log_event("tool_start", "info", json!({"name": "read"})).unwrap();
        log.log_event("tool_start", "info", json!({"name": "write"})).unwrap();

        let contents = std::fs::read_to_string(dir.path().join(".pith/logs/events.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(first["event"], "tool_start");
    }
}
