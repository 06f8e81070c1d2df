//! SQL schema for the conversation history.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- turn_id breaks ties between turns recorded in the same instant.
CREATE TABLE IF NOT EXISTS chat_history (
    turn_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id  TEXT NOT NULL,
    role        TEXT NOT NULL,   -- 'user' | 'assistant' | 'tool'
    content     TEXT NOT NULL,
    created_at  TEXT NOT NULL    -- RFC 3339 UTC, fixed nanosecond width
);

CREATE INDEX IF NOT EXISTS chat_history_session_idx
    ON chat_history(session_id, created_at);

PRAGMA user_version = 1;
";

/// Name of the history table; hidden from the stats schema description.
pub const HISTORY_TABLE: &str = "chat_history";
