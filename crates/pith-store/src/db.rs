use rusqlite::{Connection, Result};

/// Bootstrap the full schema. Idempotent — safe to call on every startup,
/// mirroring the source project's `init_db` idiom (`skynet-memory/src/db.rs`,
/// `skynet-sessions/src/db.rs`).
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    create_app_state_table(conn)?;
    create_profiles_table(conn)?;
    create_sessions_table(conn)?;
    create_messages_table(conn)?;
    create_session_summaries_table(conn)?;
    create_memory_table(conn)?;
    create_memory_fts(conn)?;
    Ok(())
}

fn create_app_state_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS app_state (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
}

fn create_profiles_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS profiles (
            profile_type TEXT NOT NULL,
            key          TEXT NOT NULL,
            value        TEXT NOT NULL,
            updated_at   TEXT NOT NULL,
            PRIMARY KEY (profile_type, key)
        );",
    )
}

fn create_sessions_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id         TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            is_active  INTEGER NOT NULL DEFAULT 0
        );",
    )
}

fn create_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id   TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            message_json TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_session
            ON messages(session_id, created_at);",
    )
}

fn create_session_summaries_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS session_summaries (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id   TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            summary_text TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );",
    )
}

fn create_memory_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memory_entries (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            content    TEXT NOT NULL,
            kind       TEXT NOT NULL DEFAULT 'durable',
            tags       TEXT,
            source     TEXT NOT NULL DEFAULT 'inferred',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted    INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_memory_deleted
            ON memory_entries(deleted, created_at DESC);",
    )
}

/// FTS5 external-content table over `memory_entries.content`, kept
/// consistent with insert/update/delete triggers per §3's explicit
/// requirement (a deliberate departure from the source project, which
/// syncs FTS manually in application code — see SPEC_FULL.md §4.1.1).
fn create_memory_fts(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS memory_entries_fts
            USING fts5(content, content='memory_entries', content_rowid='id');

        CREATE TRIGGER IF NOT EXISTS memory_entries_ai
        AFTER INSERT ON memory_entries BEGIN
            INSERT INTO memory_entries_fts(rowid, content) VALUES (new.id, new.content);
        END;

        CREATE TRIGGER IF NOT EXISTS memory_entries_ad
        AFTER DELETE ON memory_entries BEGIN
            INSERT INTO memory_entries_fts(memory_entries_fts, rowid, content)
                VALUES('delete', old.id, old.content);
        END;

        CREATE TRIGGER IF NOT EXISTS memory_entries_au
        AFTER UPDATE ON memory_entries BEGIN
            INSERT INTO memory_entries_fts(memory_entries_fts, rowid, content)
                VALUES('delete', old.id, old.content);
            INSERT INTO memory_entries_fts(rowid, content) VALUES (new.id, new.content);
        END;",
    )
}
