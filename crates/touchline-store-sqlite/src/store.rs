//! [`SqliteConversationStore`]: the server-side [`ConversationStore`].

use std::path::Path;

use touchline_core::{
  conversation::{ConversationTurn, HISTORY_LIMIT, Role, SessionId},
  store::ConversationStore,
};

use crate::{
  Result,
  encode::{RawTurn, encode_dt, encode_role},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Conversation history kept in a `chat_history` table.
///
/// Each append prunes the session to its `limit` most recent turns in the
/// same transaction. [`ConversationStore::clear`] empties the table for every
/// session.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteConversationStore {
  conn:  tokio_rusqlite::Connection,
  limit: usize,
}

impl SqliteConversationStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, limit: HISTORY_LIMIT };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, limit: HISTORY_LIMIT };
    store.init_schema().await?;
    Ok(store)
  }

  /// Retain `limit` turns per session instead of the default.
  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = limit;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ConversationStore impl ──────────────────────────────────────────────────

impl ConversationStore for SqliteConversationStore {
  type Error = crate::Error;

  async fn append(
    &self,
    session: &SessionId,
    role:    Role,
    content: &str,
  ) -> Result<ConversationTurn> {
    let turn = ConversationTurn::new(role, content);

    let session_str = session.as_str().to_owned();
    let role_str    = encode_role(role);
    let content_str = turn.content.clone();
    let at_str      = encode_dt(turn.created_at);
    let limit       = self.limit as i64;

    let pruned = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO chat_history (session_id, role, content, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![session_str, role_str, content_str, at_str],
        )?;
        let pruned = tx.execute(
          "DELETE FROM chat_history
           WHERE session_id = ?1
             AND turn_id NOT IN (
               SELECT turn_id FROM chat_history
               WHERE session_id = ?1
               ORDER BY created_at DESC, turn_id DESC
               LIMIT ?2
             )",
          rusqlite::params![session_str, limit],
        )?;
        tx.commit()?;
        Ok(pruned)
      })
      .await?;

    tracing::debug!(session = %session, %role, pruned, "appended turn");
    Ok(turn)
  }

  async fn recent(&self, session: &SessionId) -> Result<Vec<ConversationTurn>> {
    let session_str = session.as_str().to_owned();
    let limit       = self.limit as i64;

    let raws: Vec<RawTurn> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT role, content, created_at FROM (
             SELECT turn_id, role, content, created_at
             FROM chat_history
             WHERE session_id = ?1
             ORDER BY created_at DESC, turn_id DESC
             LIMIT ?2
           )
           ORDER BY created_at ASC, turn_id ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![session_str, limit], |row| {
            Ok(RawTurn {
              role:       row.get(0)?,
              content:    row.get(1)?,
              created_at: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawTurn::into_turn).collect()
  }

  async fn clear(&self, session: &SessionId) -> Result<()> {
    let removed = self
      .conn
      .call(|conn| Ok(conn.execute("DELETE FROM chat_history", [])?))
      .await?;
    tracing::info!(requested_by = %session, removed, "cleared chat history for all sessions");
    Ok(())
  }
}
