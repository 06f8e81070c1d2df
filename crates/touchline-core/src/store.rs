//! Seam traits implemented by the storage backends and the data sources.
//!
//! Higher layers (`touchline-chat`, `touchline-server`) depend on these
//! abstractions, not on any concrete backend.

use std::future::Future;

use serde_json::{Map, Value};

use crate::{
  conversation::{ConversationTurn, Role, SessionId},
  record::StatRecord,
  stat::StatCategory,
};

/// A JSON object per result row, keyed by column name in select order.
pub type QueryRow = Map<String, Value>;

// ─── Conversation store ──────────────────────────────────────────────────────

/// Bounded, ordered history of a session.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ConversationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Record a turn for `session` and return it as stored.
  fn append<'a>(
    &'a self,
    session: &'a SessionId,
    role: Role,
    content: &'a str,
  ) -> impl Future<Output = Result<ConversationTurn, Self::Error>> + Send + 'a;

  /// At most [`HISTORY_LIMIT`](crate::conversation::HISTORY_LIMIT) of the most
  /// recent turns, oldest first.
  fn recent<'a>(
    &'a self,
    session: &'a SessionId,
  ) -> impl Future<Output = Result<Vec<ConversationTurn>, Self::Error>> + Send + 'a;

  /// Forget history. Each backend decides what a clear covers.
  fn clear<'a>(
    &'a self,
    session: &'a SessionId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Data sources ────────────────────────────────────────────────────────────

/// Fetches a fresh stat table.
pub trait StatSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn fetch<'a>(
    &'a self,
    category: StatCategory,
    season: &'a str,
    competition: &'a str,
  ) -> impl Future<Output = Result<Vec<StatRecord>, Self::Error>> + Send + 'a;
}

/// Read-only SQL access to previously ingested statistics.
pub trait StatsQuery: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Table → column → declared type, as pretty-printed JSON.
  fn schema_json(&self) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  fn query<'a>(
    &'a self,
    sql: &'a str,
  ) -> impl Future<Output = Result<Vec<QueryRow>, Self::Error>> + Send + 'a;
}
