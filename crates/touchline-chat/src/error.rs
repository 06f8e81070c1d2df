use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("HTTP request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("API error ({code}): {message}")]
  Api { code: u16, message: String },

  #[error("missing API key")]
  MissingApiKey,

  #[error("no data from the model for {0:?}")]
  Stalled(std::time::Duration),

  #[error("model returned no candidates")]
  EmptyResponse,

  #[error("malformed model response: {0}")]
  Json(#[from] serde_json::Error),

  #[error("conversation store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("exchange failed: {0}")]
  Exchange(String),
}

impl Error {
  pub fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
