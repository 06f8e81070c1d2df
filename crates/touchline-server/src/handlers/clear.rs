use axum::{
  Json,
  extract::State,
  http::header,
  response::{IntoResponse, Response},
};
use serde_json::json;
use touchline_core::store::ConversationStore;

use crate::{
  AppState, HistoryBackend,
  error::{Error, Result},
  session::{Session, clear_cookie},
};

pub const CLEARED_MESSAGE: &str = "All chat history cleared successfully";

/// `POST /clear_history`
///
/// With the server backend this empties the history table for every
/// session. Either way the session cookie is dropped.
pub async fn clear_history<S, M, T>(
  State(state): State<AppState<S, M, T>>,
  session: Session,
) -> Result<Response>
where
  S: ConversationStore,
{
  if state.config.history_backend == HistoryBackend::Server {
    state.store.clear(&session.data.id).await.map_err(Error::store)?;
  }
  tracing::info!(session = %session.data.id, "history cleared");
  Ok(
    (
      [(header::SET_COOKIE, clear_cookie())],
      Json(json!({ "message": CLEARED_MESSAGE })),
    )
      .into_response(),
  )
}
