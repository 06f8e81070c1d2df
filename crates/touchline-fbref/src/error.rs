//! Error types for the fbref scraper.

use thiserror::Error;

/// The page did not have the expected structure.
#[derive(Debug, Error)]
pub enum ExtractionError {
  #[error("container not found")]
  ContainerNotFound,

  #[error("invalid selector: {0}")]
  Selector(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
  #[error("unknown competition: {0:?}")]
  UnknownCompetition(String),

  #[error("GET {url} returned {status}")]
  Fetch { url: String, status: u16 },

  #[error("GET {url} was answered with a bot challenge")]
  Challenge { url: String },

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("extraction failed: {0}")]
  Extraction(#[from] ExtractionError),
}

pub type Result<T, E = SourceError> = std::result::Result<T, E>;
