//! `touchline`: ingestion and inspection tooling for Touchline.
//!
//! # Usage
//!
//! ```
//! touchline ingest --stats-path stats.db --season 2023-2024 --season 2024-2025
//! touchline scrape --category keeper --competition "Serie A" --csv keepers.csv
//! touchline describe --stats-path stats.db
//! touchline ask "Who has the most goals this season?"
//! ```

mod client;
mod ingest;
mod output;

use std::{
  io::{self, Write as _},
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use client::{ChatClient, Reply};
use futures::TryStreamExt as _;
use ingest::IngestPlan;
use serde::Deserialize;
use touchline_core::{
  competition::CompetitionDirectory,
  stat::StatCategory,
  store::StatsQuery as _,
};
use touchline_fbref::{FbrefClient, FbrefConfig};
use touchline_store_sqlite::StatsDb;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "touchline", about = "Ingestion and inspection tooling for Touchline")]
struct Args {
  /// Path to a TOML config file (url, stats_path, source_url, timeout_secs).
  #[arg(short, long, value_name = "FILE", global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Scrape every season × competition × category into the statistics database.
  Ingest {
    #[arg(long, env = "TOUCHLINE_STATS_PATH")]
    stats_path:  Option<PathBuf>,
    /// Seasons as YYYY-YYYY (default: 2024-2025).
    #[arg(long, value_delimiter = ',')]
    season:      Vec<String>,
    /// Competitions to ingest (default: all known competitions).
    #[arg(long, value_delimiter = ',')]
    competition: Vec<String>,
    /// Stat categories to ingest (default: all).
    #[arg(long, value_delimiter = ',', value_parser = parse_category)]
    category:    Vec<StatCategory>,
    /// Seconds to wait between source requests.
    #[arg(long, default_value_t = 1.0)]
    delay_secs:  f64,
  },
  /// Fetch one stat table and print it.
  Scrape {
    #[arg(long, value_parser = parse_category)]
    category:    StatCategory,
    #[arg(long, default_value = DEFAULT_SEASON)]
    season:      String,
    #[arg(long, default_value = "Premier-League")]
    competition: String,
    /// Write CSV to this file instead of printing a table.
    #[arg(long, value_name = "FILE")]
    csv:         Option<PathBuf>,
  },
  /// Print the statistics database schema as JSON.
  Describe {
    #[arg(long, env = "TOUCHLINE_STATS_PATH")]
    stats_path: Option<PathBuf>,
  },
  /// Ask the chat server a question and print the answer as it streams.
  Ask {
    /// Base URL of the touchline server (default: http://localhost:5000).
    #[arg(long, env = "TOUCHLINE_URL")]
    url:      Option<String>,
    #[arg(required = true, num_args = 1..)]
    question: Vec<String>,
  },
}

const DEFAULT_SEASON: &str = "2024-2025";

fn parse_category(s: &str) -> Result<StatCategory, String> {
  StatCategory::parse(s).map_err(|e| e.to_string())
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:          String,
  #[serde(default)]
  stats_path:   Option<PathBuf>,
  #[serde(default)]
  source_url:   String,
  #[serde(default)]
  timeout_secs: Option<u64>,
}

impl ConfigFile {
  fn load(path: Option<&Path>) -> Result<Self> {
    let Some(path) = path else { return Ok(Self::default()) };
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")
  }

  fn stats_path(&self, flag: Option<PathBuf>) -> Result<PathBuf> {
    flag
      .or_else(|| self.stats_path.clone())
      .map(|p| expand_tilde(&p))
      .context("no statistics database given (--stats-path or stats_path in the config file)")
  }

  fn source(&self) -> Result<FbrefClient> {
    let config = FbrefConfig {
      base_url: (!self.source_url.is_empty())
        .then(|| self.source_url.clone())
        .unwrap_or_else(|| touchline_fbref::DEFAULT_BASE_URL.to_owned()),
      timeout:  Duration::from_secs(self.timeout_secs.unwrap_or(30)),
    };
    FbrefClient::new(config, CompetitionDirectory::default()).context("failed to build stat source client")
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  dotenvy::dotenv().ok();

  // Logs go to stderr so tables and CSV on stdout stay clean.
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();
  let file_cfg = ConfigFile::load(args.config.as_deref())?;

  match args.command {
    Command::Ingest { stats_path, season, competition, category, delay_secs } => {
      let path = file_cfg.stats_path(stats_path)?;
      let db = StatsDb::open(&path)
        .await
        .with_context(|| format!("failed to open statistics database at {path:?}"))?;
      let source = file_cfg.source()?;

      let plan = IngestPlan {
        seasons:      or_default(season, || vec![DEFAULT_SEASON.to_owned()]),
        competitions: or_default(competition, || {
          source.directory().iter().map(|c| c.name.clone()).collect()
        }),
        categories:   or_default(category, || StatCategory::all().collect()),
        delay:        Duration::try_from_secs_f64(delay_secs).context("invalid --delay-secs")?,
      };

      let report = ingest::ingest(&source, source.directory(), &db, &plan).await?;
      tracing::info!(
        stored = report.stored.len(),
        rows = report.stored.iter().map(|(_, n)| n).sum::<usize>(),
        skipped = report.skipped.len(),
        empty = report.empty.len(),
        failed = report.failed.len(),
        "ingestion finished"
      );
    }

    Command::Scrape { category, season, competition, csv } => {
      let records = file_cfg
        .source()?
        .fetch(category, &season, &competition)
        .await
        .with_context(|| format!("scraping {category} for {competition} {season}"))?;

      match csv {
        Some(path) => {
          let file = std::fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
          output::write_csv(&records, file).context("writing CSV")?;
          tracing::info!(rows = records.len(), path = %path.display(), "wrote CSV");
        }
        None => print!("{}", output::render_table(&records)),
      }
    }

    Command::Describe { stats_path } => {
      let path = file_cfg.stats_path(stats_path)?;
      let db = StatsDb::open(&path)
        .await
        .with_context(|| format!("failed to open statistics database at {path:?}"))?;
      println!("{}", db.schema_json().await.context("describing statistics database")?);
    }

    Command::Ask { url, question } => {
      let base_url = url
        .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
        .unwrap_or_else(|| "http://localhost:5000".to_string());
      ask(&ChatClient::new(base_url)?, &question.join(" ")).await?;
    }
  }

  Ok(())
}

async fn ask(client: &ChatClient, question: &str) -> Result<()> {
  let replies = client.ask(question).await?;
  futures::pin_mut!(replies);

  let mut stdout = io::stdout();
  let mut failure = None;
  while let Some(reply) = replies.try_next().await? {
    match reply {
      Reply::Status(text) => eprintln!("{text}"),
      Reply::Token(text) | Reply::Notice(text) => {
        write!(stdout, "{text}")?;
        stdout.flush()?;
      }
      Reply::Error(text) => failure = Some(text),
    }
  }
  writeln!(stdout)?;

  if let Some(message) = failure {
    bail!("server reported an error: {message}");
  }
  Ok(())
}

fn or_default<T>(given: Vec<T>, default: impl FnOnce() -> Vec<T>) -> Vec<T> {
  if given.is_empty() { default() } else { given }
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
