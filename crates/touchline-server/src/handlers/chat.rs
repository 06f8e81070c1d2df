//! `GET /chat` (server-sent events) and `POST /chat` (JSON).

use std::{convert::Infallible, sync::Arc};

use axum::{
  Json,
  extract::{Query, State},
  http::header,
  response::{
    IntoResponse, Response,
    sse::{Event, KeepAlive, Sse},
  },
};
use futures::{StreamExt as _, stream};
use serde::{Deserialize, Serialize};
use serde_json::json;
use touchline_chat::{ChatEvent, LanguageModel, ToolDispatch};
use touchline_core::{
  conversation::ConversationTurn,
  store::ConversationStore,
};

use crate::{
  AppState, HistoryBackend,
  error::{Error, Result},
  history::{ClientHeldStore, HeldTurn},
  session::{Session, SessionData},
};

pub const APOLOGY: &str = "I am sorry, I did not receive a question. Please try again.";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
  #[serde(default)]
  pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
  pub reply:        String,
  /// Visible dialogue, oldest first.
  pub chat_history: Vec<HeldTurn>,
}

fn question(request: ChatRequest) -> Option<String> {
  request
    .message
    .map(|m| m.trim().to_owned())
    .filter(|m| !m.is_empty())
}

// ─── SSE ─────────────────────────────────────────────────────────────────────

fn data_event(kind: &str, content: &str) -> Event {
  Event::default().data(json!({ "type": kind, "content": content }).to_string())
}

fn end_event() -> Event { Event::default().event("end-of-stream").data("close") }

fn to_sse(event: ChatEvent) -> Event {
  match event {
    ChatEvent::Status(c) => data_event("status", &c),
    ChatEvent::Token(c) => data_event("token", &c),
    ChatEvent::Error(c) => data_event("error", &c),
    ChatEvent::End => end_event(),
  }
}

/// `GET /chat?message=…`
///
/// Streams `{"type": "status" | "token" | "error", "content": …}` data events
/// and ends with an `end-of-stream` event. Requires the server history
/// backend: a cookie cannot be re-issued once the body has started.
pub async fn chat_stream<S, M, T>(
  State(state): State<AppState<S, M, T>>,
  session: Session,
  Query(request): Query<ChatRequest>,
) -> Result<Response>
where
  S: ConversationStore + 'static,
  M: LanguageModel + 'static,
  T: ToolDispatch + 'static,
{
  if state.config.history_backend == HistoryBackend::Cookie {
    return Err(Error::BadRequest(
      "streaming needs the server history backend; POST /chat instead".to_owned(),
    ));
  }

  let set_cookie = session
    .is_new
    .then(|| state.key.set_cookie(&SessionData { id: session.data.id.clone(), history: Vec::new() }))
    .transpose()?;

  let mut response = match question(request) {
    None => {
      let apology = json!(APOLOGY).to_string();
      let events = stream::iter([Event::default().data(apology), end_event()]);
      Sse::new(events.map(Ok::<_, Infallible>)).into_response()
    }
    Some(message) => {
      tracing::info!(session = %session.data.id, question = %message, "chat stream");
      let events = state
        .chat
        .exchange(Arc::clone(&state.store), session.data.id, message)
        .map(|e| Ok::<_, Infallible>(to_sse(e)));
      Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
    }
  };

  if let Some(cookie) = set_cookie {
    response.headers_mut().append(header::SET_COOKIE, cookie);
  }
  Ok(response)
}

// ─── JSON ────────────────────────────────────────────────────────────────────

/// `POST /chat` with `{"message": …}`.
///
/// Runs the exchange to completion and returns the answer with the
/// session's visible history. Works with both history backends.
pub async fn chat_json<S, M, T>(
  State(state): State<AppState<S, M, T>>,
  session: Session,
  Json(request): Json<ChatRequest>,
) -> Result<Response>
where
  S: ConversationStore + 'static,
  M: LanguageModel + 'static,
  T: ToolDispatch + 'static,
{
  let message = question(request).ok_or_else(|| Error::BadRequest(APOLOGY.to_owned()))?;
  let id = session.data.id.clone();
  tracing::info!(session = %id, question = %message, "chat request");

  let (reply, history) = match state.config.history_backend {
    HistoryBackend::Server => {
      let reply = state.chat.answer(Arc::clone(&state.store), id.clone(), message).await?;
      let turns = state.store.recent(&id).await.map_err(Error::store)?;
      (reply, dialogue(turns))
    }
    HistoryBackend::Cookie => {
      let held = Arc::new(ClientHeldStore::new(session.data.history));
      let reply = state.chat.answer(Arc::clone(&held), id.clone(), message).await?;
      (reply, held.snapshot())
    }
  };

  let cookie = match state.config.history_backend {
    HistoryBackend::Cookie => Some(SessionData { id, history: history.clone() }),
    HistoryBackend::Server if session.is_new => Some(SessionData { id, history: Vec::new() }),
    HistoryBackend::Server => None,
  };

  let mut response = Json(ChatReply { reply, chat_history: history }).into_response();
  if let Some(data) = cookie {
    response.headers_mut().append(header::SET_COOKIE, state.key.set_cookie(&data)?);
  }
  Ok(response)
}

fn dialogue(turns: Vec<ConversationTurn>) -> Vec<HeldTurn> {
  turns
    .into_iter()
    .filter(|t| t.role.is_dialogue())
    .map(|t| HeldTurn { role: t.role, content: t.content })
    .collect()
}
