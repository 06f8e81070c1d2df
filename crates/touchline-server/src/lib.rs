//! HTTP surface for Touchline.
//!
//! Exposes an axum [`Router`] serving the chat page, the streaming and JSON
//! chat endpoints and history clearing, backed by any
//! [`ConversationStore`], [`LanguageModel`] and [`ToolDispatch`].

pub mod error;
pub mod handlers;
pub mod history;
pub mod session;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::FromRef,
  routing::{get, post},
};
use serde::Deserialize;
use touchline_chat::{LanguageModel, Orchestrator, ToolDispatch};
use touchline_core::store::ConversationStore;
use tower_http::trace::TraceLayer;

use session::SessionKey;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Where conversation history is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
  /// SQLite, keyed by session id.
  #[default]
  Server,
  /// In the signed session cookie.
  Cookie,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
  /// Falls back to `GOOGLE_API_KEY`.
  #[serde(default)]
  pub api_key:  Option<String>,
  #[serde(default = "default_model")]
  pub model:    String,
  #[serde(default)]
  pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
  #[serde(default = "default_source_url")]
  pub base_url:     String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

/// Runtime server configuration, deserialised from `config.toml` and
/// `TOUCHLINE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:            String,
  #[serde(default = "default_port")]
  pub port:            u16,
  #[serde(default = "default_store_path")]
  pub store_path:      PathBuf,
  /// Statistics database with ingested tables; enables the SQL tool.
  #[serde(default)]
  pub stats_path:      Option<PathBuf>,
  /// HMAC secret for session cookies. An empty secret is replaced by a
  /// random one at startup, which invalidates cookies on restart.
  #[serde(default)]
  pub session_secret:  String,
  #[serde(default)]
  pub history_backend: HistoryBackend,
  #[serde(default = "default_season")]
  pub current_season:  String,
  #[serde(default = "default_llm")]
  pub llm:             LlmConfig,
  #[serde(default = "default_source")]
  pub source:          SourceConfig,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 5000 }
fn default_store_path() -> PathBuf { PathBuf::from("touchline.db") }
fn default_season() -> String { "2024-2025".to_owned() }
fn default_model() -> String { touchline_chat::gemini::DEFAULT_MODEL.to_owned() }
fn default_source_url() -> String { touchline_fbref::DEFAULT_BASE_URL.to_owned() }
fn default_timeout_secs() -> u64 { 30 }

fn default_llm() -> LlmConfig {
  LlmConfig { api_key: None, model: default_model(), base_url: None }
}

fn default_source() -> SourceConfig {
  SourceConfig { base_url: default_source_url(), timeout_secs: default_timeout_secs() }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, M, T> {
  /// Server-side history; unused when the cookie backend is selected.
  pub store:  Arc<S>,
  pub chat:   Orchestrator<M, T>,
  pub config: Arc<ServerConfig>,
  pub key:    Arc<SessionKey>,
}

impl<S, M, T> Clone for AppState<S, M, T> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      chat:   self.chat.clone(),
      config: Arc::clone(&self.config),
      key:    Arc::clone(&self.key),
    }
  }
}

impl<S, M, T> FromRef<AppState<S, M, T>> for Arc<SessionKey> {
  fn from_ref(state: &AppState<S, M, T>) -> Self { Arc::clone(&state.key) }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the chat server.
pub fn router<S, M, T>(state: AppState<S, M, T>) -> Router
where
  S: ConversationStore + 'static,
  M: LanguageModel + 'static,
  T: ToolDispatch + 'static,
{
  Router::new()
    .route("/", get(handlers::index::<S, M, T>))
    .route(
      "/chat",
      get(handlers::chat_stream::<S, M, T>).post(handlers::chat_json::<S, M, T>),
    )
    .route("/clear_history", post(handlers::clear_history::<S, M, T>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
