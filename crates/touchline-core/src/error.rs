//! Error types for `touchline-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown conversation role: {0:?}")]
  UnknownRole(String),

  #[error("unknown stat category: {0:?}")]
  UnknownStatCategory(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
