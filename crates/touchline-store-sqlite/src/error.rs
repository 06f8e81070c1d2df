//! Error type for `touchline-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] touchline_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The statement would modify the database.
  #[error("only read-only statements are allowed")]
  ReadOnly,

  #[error("invalid table name: {0:?}")]
  InvalidTableName(String),

  #[error("no rows to store in {0}")]
  NoRows(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
