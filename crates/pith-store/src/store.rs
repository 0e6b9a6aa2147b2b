use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::instrument;

use pith_core::types::{ProfileType, SessionId};

use crate::db;
use crate::error::{Result, StoreError};
use crate::log::EventLog;
use crate::types::{MemoryEntry, MemorySource, ModelMessage, SessionSummary};

const ACTIVE_SESSION_KEY: &str = "active_session_id";
const BOOTSTRAP_COMPLETE_KEY: &str = "bootstrap_complete";

/// The single-writer SQLite-backed store. Owns the only connection and the
/// only event log handle in the process, per §3 Ownership.
pub struct Store {
    db: Mutex<Connection>,
    events: EventLog,
}

impl Store {
    /// Open (creating if absent) the database at `<workspace_root>/memory.db`
    /// and run schema bootstrap. Must be called before any other operation.
    pub fn open(workspace_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(workspace_root)?;
        let db_path = workspace_root.join("memory.db");
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        db::ensure_schema(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            events: EventLog::new(workspace_root),
        })
    }

    /// In-memory store for tests — still runs the full schema bootstrap.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::ensure_schema(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            events: EventLog::new(Path::new(".")),
        })
    }

    // ---- AppState -----------------------------------------------------

    pub fn set_app_state(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO app_state (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_app_state(&self, key: &str, default: &str) -> Result<String> {
        let db = self.db.lock().unwrap();
        let value: Option<String> = db
            .query_row("SELECT value FROM app_state WHERE key = ?1", params![key], |r| r.get(0))
            .optional()?;
        Ok(value.unwrap_or_else(|| default.to_string()))
    }

    // ---- Profiles -------------------------------------------------------

    pub fn set_profile(&self, profile_type: ProfileType, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO profiles (profile_type, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(profile_type, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![profile_type.to_string(), key, value, now],
        )?;
        Ok(())
    }

    /// Ordered (by key) mapping of the given profile's fields.
    pub fn get_profile(&self, profile_type: ProfileType) -> Result<Vec<(String, String)>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT key, value FROM profiles WHERE profile_type = ?1 ORDER BY key ASC",
        )?;
        let rows = stmt
            .query_map(params![profile_type.to_string()], |r| Ok((r.get(0)?, r.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    fn profile_field(&self, profile_type: ProfileType, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        let value = db
            .query_row(
                "SELECT value FROM profiles WHERE profile_type = ?1 AND key = ?2",
                params![profile_type.to_string(), key],
                |r| r.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    // ---- Bootstrap -------------------------------------------------------

    /// True iff AppState explicitly says so, or the derived condition (agent
    /// name+nature and user name all non-empty) holds. Monotonic: once true,
    /// stays true (invariant #1).
    #[instrument(skip(self))]
    pub fn get_bootstrap_state(&self) -> Result<bool> {
        if self.get_app_state(BOOTSTRAP_COMPLETE_KEY, "false")? == "true" {
            return Ok(true);
        }

        let agent_name = self.profile_field(ProfileType::Agent, "name")?.unwrap_or_default();
        let agent_nature = self.profile_field(ProfileType::Agent, "nature")?.unwrap_or_default();
        let user_name = self.profile_field(ProfileType::User, "name")?.unwrap_or_default();

        let derived = !agent_name.trim().is_empty()
            && !agent_nature.trim().is_empty()
            && !user_name.trim().is_empty();

        if derived {
            // Persist so the flag never regresses even if profile fields are later blanked.
            self.set_bootstrap_complete(true)?;
        }

        Ok(derived)
    }

    pub fn set_bootstrap_complete(&self, complete: bool) -> Result<()> {
        self.set_app_state(BOOTSTRAP_COMPLETE_KEY, if complete { "true" } else { "false" })
    }

    // ---- Sessions -------------------------------------------------------

    /// Return the active session if any, otherwise create and install one.
    #[instrument(skip(self))]
    pub fn ensure_active_session(&self) -> Result<SessionId> {
        let current = self.get_app_state(ACTIVE_SESSION_KEY, "")?;
        if !current.is_empty() {
            let exists: Option<String> = {
                let db = self.db.lock().unwrap();
                db.query_row("SELECT id FROM sessions WHERE id = ?1", params![current], |r| r.get(0))
                    .optional()?
            };
            if let Some(id) = exists {
                return Ok(SessionId::from(id));
            }
        }
        self.new_session()
    }

    /// Always creates a new session and installs it as active.
    #[instrument(skip(self))]
    pub fn new_session(&self) -> Result<SessionId> {
        let id = SessionId::generate();
        let now = chrono::Utc::now().to_rfc3339();
        {
            let db = self.db.lock().unwrap();
            db.execute(
                "UPDATE sessions SET is_active = 0 WHERE is_active = 1",
                [],
            )?;
            db.execute(
                "INSERT INTO sessions (id, created_at, updated_at, is_active) VALUES (?1, ?2, ?2, 1)",
                params![id.as_str(), now],
            )?;
        }
        self.set_app_state(ACTIVE_SESSION_KEY, id.as_str())?;
        Ok(id)
    }

    // ---- Messages -------------------------------------------------------

    #[instrument(skip(self, messages))]
    pub fn append_messages(&self, session_id: &SessionId, messages: &[ModelMessage]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        for message in messages {
            let json = serde_json::to_string(message)?;
            db.execute(
                "INSERT INTO messages (session_id, message_json, created_at) VALUES (?1, ?2, ?3)",
                params![session_id.as_str(), json, now],
            )?;
        }
        db.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
            params![now, session_id.as_str()],
        )?;
        Ok(())
    }

    /// Last `limit` messages by id, re-ordered ascending (chronological).
    pub fn get_message_history(&self, session_id: &SessionId, limit: usize) -> Result<Vec<ModelMessage>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT message_json FROM messages WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let mut rows: Vec<String> = stmt
            .query_map(params![session_id.as_str(), limit as i64], |r| r.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        rows.reverse();
        rows.into_iter()
            .map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .collect()
    }

    /// Count of messages in the last-20 window, used by `get_info` (§4.4.6).
    pub fn message_count(&self, session_id: &SessionId, limit: usize) -> Result<usize> {
        Ok(self.get_message_history(session_id, limit)?.len())
    }

    /// If total > keep_recent: writes one summary of the surplus oldest
    /// messages (serialized form truncated to <=200 chars each, newline
    /// joined), then deletes those rows. Atomic. No-op otherwise.
    #[instrument(skip(self))]
    pub fn compact_session(&self, session_id: &SessionId, keep_recent: usize) -> Result<Option<SessionSummary>> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;

        let total: i64 = tx.query_row(
            "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
            params![session_id.as_str()],
            |r| r.get(0),
        )?;
        let total = total as usize;
        if total <= keep_recent {
            tx.commit()?;
            return Ok(None);
        }

        let surplus = total - keep_recent;
        let mut stmt = tx.prepare(
            "SELECT id, message_json FROM messages WHERE session_id = ?1 ORDER BY id ASC LIMIT ?2",
        )?;
        let surplus_rows: Vec<(i64, String)> = stmt
            .query_map(params![session_id.as_str(), surplus as i64], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);

        let summary_text = surplus_rows
            .iter()
            .map(|(_, json)| truncate(json, 200))
            .collect::<Vec<_>>()
            .join("\n");

        let now = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO session_summaries (session_id, summary_text, created_at) VALUES (?1, ?2, ?3)",
            params![session_id.as_str(), summary_text, now],
        )?;
        let summary_id = tx.last_insert_rowid();

        let ids: Vec<i64> = surplus_rows.iter().map(|(id, _)| *id).collect();
        for id in &ids {
            tx.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        }

        tx.commit()?;

        Ok(Some(SessionSummary {
            id: summary_id,
            session_id: session_id.as_str().to_string(),
            summary_text,
            created_at: now,
        }))
    }

    pub fn list_session_summaries(&self, session_id: &SessionId) -> Result<Vec<SessionSummary>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, session_id, summary_text, created_at FROM session_summaries
             WHERE session_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id.as_str()], |r| {
                Ok(SessionSummary {
                    id: r.get(0)?,
                    session_id: r.get(1)?,
                    summary_text: r.get(2)?,
                    created_at: r.get(3)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // ---- Memory ----------------------------------------------------------

    #[instrument(skip(self, content))]
    pub fn memory_save(&self, content: &str, kind: &str, tags: Option<&str>, source: MemorySource) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO memory_entries (content, kind, tags, source, created_at, updated_at, deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, 0)",
            params![content, kind, tags, source.to_string(), now],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// FTS match ordered by rank; falls back to substring match on any FTS
    /// operational error (invariant #7 / §4.1).
    pub fn memory_search(&self, query: &str, limit: usize) -> Result<Vec<MemoryEntry>> {
        let db = self.db.lock().unwrap();
        let fts_result = (|| -> rusqlite::Result<Vec<MemoryEntry>> {
            let mut stmt = db.prepare(
                "SELECT m.id, m.content, m.kind, m.tags, m.source, m.created_at, m.updated_at, m.deleted
                 FROM memory_entries m
                 JOIN memory_entries_fts f ON m.id = f.rowid
                 WHERE memory_entries_fts MATCH ?1 AND m.deleted = 0
                 ORDER BY rank
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![query, limit as i64], row_to_memory)?;
            rows.collect()
        })();

        match fts_result {
            Ok(rows) => Ok(rows),
            Err(_) => {
                let mut stmt = db.prepare(
                    "SELECT id, content, kind, tags, source, created_at, updated_at, deleted
                     FROM memory_entries
                     WHERE deleted = 0 AND content LIKE '%' || ?1 || '%'
                     ORDER BY created_at DESC
                     LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![query, limit as i64], row_to_memory)?;
                Ok(rows.filter_map(|r| r.ok()).collect())
            }
        }
    }

    // ---- Events -----------------------------------------------------------

    pub fn log_event(&self, event: &str, level: &str, payload: serde_json::Value) -> Result<()> {
        self.events.log_event(event, level, payload)
    }
}

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryEntry> {
    let source_str: String = row.get(4)?;
    Ok(MemoryEntry {
        id: row.get(0)?,
        content: row.get(1)?,
        kind: row.get(2)?,
        tags: row.get(3)?,
        source: source_str.parse().unwrap_or(MemorySource::Inferred),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        deleted: row.get::<_, i64>(7)? != 0,
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pith_core::types::ProfileType;

    #[test]
    fn app_state_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.get_app_state("foo", "default").unwrap(), "default");
        store.set_app_state("foo", "bar").unwrap();
        assert_eq!(store.get_app_state("foo", "default").unwrap(), "bar");
    }

    #[test]
    fn bootstrap_monotonicity() {
        let store = Store::open_in_memory().unwrap();
        assert!(!store.get_bootstrap_state().unwrap());
        store.set_bootstrap_complete(true).unwrap();
        assert!(store.get_bootstrap_state().unwrap());
        // Blanking profile fields afterwards must not regress it.
        store.set_profile(ProfileType::Agent, "name", "").unwrap();
        assert!(store.get_bootstrap_state().unwrap());
    }

    #[test]
    fn derived_bootstrap_without_explicit_flag() {
        let store = Store::open_in_memory().unwrap();
        store.set_profile(ProfileType::Agent, "name", "pith").unwrap();
        store.set_profile(ProfileType::Agent, "nature", "assistant").unwrap();
        assert!(!store.get_bootstrap_state().unwrap());
        store.set_profile(ProfileType::User, "name", "david").unwrap();
        assert!(store.get_bootstrap_state().unwrap());
    }

    #[test]
    fn message_ordering_is_chronological() {
        let store = Store::open_in_memory().unwrap();
        let sid = store.new_session().unwrap();
        store
            .append_messages(&sid, &[ModelMessage::User { text: "one".into() }])
            .unwrap();
        store
            .append_messages(&sid, &[ModelMessage::Assistant { text: "two".into() }])
            .unwrap();
        let history = store.get_message_history(&sid, 20).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ModelMessage::User { text: "one".into() });
        assert_eq!(history[1], ModelMessage::Assistant { text: "two".into() });
    }

    #[test]
    fn compaction_preserves_keep_recent_and_writes_one_summary() {
        let store = Store::open_in_memory().unwrap();
        let sid = store.new_session().unwrap();
        for i in 0..10 {
            store
                .append_messages(&sid, &[ModelMessage::User { text: format!("msg {i}") }])
                .unwrap();
        }
        let summary = store.compact_session(&sid, 3).unwrap().expect("summary written");
        assert_eq!(summary.summary_text.lines().count(), 7);
        let remaining = store.get_message_history(&sid, 100).unwrap();
        assert_eq!(remaining.len(), 3);
        let summaries = store.list_session_summaries(&sid).unwrap();
        assert_eq!(summaries.len(), 1);
    }

    #[test]
    fn compaction_is_noop_when_under_keep_recent() {
        let store = Store::open_in_memory().unwrap();
        let sid = store.new_session().unwrap();
        store
            .append_messages(&sid, &[ModelMessage::User { text: "one".into() }])
            .unwrap();
        let summary = store.compact_session(&sid, 50).unwrap();
        assert!(summary.is_none());
    }

    #[test]
    fn memory_roundtrip_via_fts() {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .memory_save("user prefers metric units", "durable", None, MemorySource::UserSaid)
            .unwrap();
        let results = store.memory_search("metric", 8).unwrap();
        assert!(results.iter().any(|m| m.id == id && m.content == "user prefers metric units"));
    }

    #[test]
    fn memory_search_excludes_soft_deleted() {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .memory_save("temporary note", "episodic", None, MemorySource::Inferred)
            .unwrap();
        {
            let db = store.db.lock().unwrap();
            db.execute("UPDATE memory_entries SET deleted = 1 WHERE id = ?1", params![id])
                .unwrap();
        }
        let results = store.memory_search("temporary", 8).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn ensure_active_session_creates_then_reuses() {
        let store = Store::open_in_memory().unwrap();
        let first = store.ensure_active_session().unwrap();
        let second = store.ensure_active_session().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn new_session_switches_active_pointer() {
        let store = Store::open_in_memory().unwrap();
        let first = store.new_session().unwrap();
        let second = store.new_session().unwrap();
        assert_ne!(first, second);
        assert_eq!(store.ensure_active_session().unwrap(), second);
    }
}
