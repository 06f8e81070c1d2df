//! touchline chat server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) and `TOUCHLINE_*`
//! environment variables, opens the history and statistics databases, and
//! serves the chat over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use touchline_chat::{GeminiClient, GeminiConfig, Orchestrator, PromptConfig, Toolbox};
use touchline_core::{competition::CompetitionDirectory, store::StatsQuery as _};
use touchline_fbref::{FbrefClient, FbrefConfig};
use touchline_server::{AppState, ServerConfig, session::SessionKey};
use touchline_store_sqlite::{SqliteConversationStore, StatsDb};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Touchline chat server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("TOUCHLINE")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // History store.
  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteConversationStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open history store at {store_path:?}"))?;

  // Statistics database, rendered once for the decision prompt.
  let (stats, schema) = match &server_cfg.stats_path {
    Some(path) => {
      let path = expand_tilde(path);
      let db = StatsDb::open(&path)
        .await
        .with_context(|| format!("failed to open statistics database at {path:?}"))?;
      let schema = db.schema_json().await.context("failed to describe statistics database")?;
      (Some(db), Some(schema))
    }
    None => {
      tracing::warn!("no stats_path configured, the SQL tool is disabled");
      (None, None)
    }
  };

  let directory = CompetitionDirectory::default();
  let source = FbrefClient::new(
    FbrefConfig {
      base_url: server_cfg.source.base_url.clone(),
      timeout:  Duration::from_secs(server_cfg.source.timeout_secs),
    },
    directory.clone(),
  )
  .context("failed to build stat source client")?;

  let mut llm_cfg = GeminiConfig::new(server_cfg.llm.api_key.clone(), server_cfg.llm.model.clone());
  if let Some(base_url) = &server_cfg.llm.base_url {
    llm_cfg = llm_cfg.with_base_url(base_url.clone());
  }
  let model = GeminiClient::new(llm_cfg).context("failed to build Gemini client")?;

  let prompt = PromptConfig::new(server_cfg.current_season.clone(), &directory, schema.as_deref());
  let chat = Orchestrator::new(model, Toolbox::new(source, stats), prompt);

  let key = session_key(&server_cfg.session_secret)?;

  let state = AppState {
    store: Arc::new(store),
    chat,
    config: Arc::new(server_cfg.clone()),
    key: Arc::new(key),
  };

  let app = touchline_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(backend = ?server_cfg.history_backend, "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn session_key(secret: &str) -> anyhow::Result<SessionKey> {
  let secret = if secret.is_empty() {
    tracing::warn!("no session_secret configured, sessions will not survive a restart");
    format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4())
  } else {
    secret.to_owned()
  };
  SessionKey::new(secret.as_bytes()).context("invalid session secret")
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
