use axum::{extract::State, response::Html};

use crate::{AppState, HistoryBackend};

const PAGE: &str = include_str!("../../assets/index.html");

/// `GET /`: the chat page. The page streams over `GET /chat` unless
/// history is kept in the cookie, where it posts JSON instead.
pub async fn index<S, M, T>(State(state): State<AppState<S, M, T>>) -> Html<String> {
  let mode = match state.config.history_backend {
    HistoryBackend::Server => "stream",
    HistoryBackend::Cookie => "json",
  };
  Html(PAGE.replace("__CHAT_MODE__", mode))
}
