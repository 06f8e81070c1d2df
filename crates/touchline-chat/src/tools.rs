//! Tools the decision step may call, and their dispatch.
//!
//! Tool failures never fail the exchange: every outcome, including errors,
//! is rendered to the text used as answer context.

use std::future::Future;

use serde::Serialize;
use serde_json::{Value, json};
use touchline_core::{
  competition::normalize_name,
  stat::StatCategory,
  store::{StatSource, StatsQuery},
};

use crate::model::ToolCall;

pub const SCRAPE_STATS: &str = "scrape_stats";
pub const RUN_SQL: &str = "run_sql";

const DEFAULT_COMPETITION: &str = "Premier-League";
const NO_DATA: &str = "Tool returned no data.";

// ─── Declarations ────────────────────────────────────────────────────────────

/// A function declaration as offered to the decision model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDeclaration {
  pub name:        &'static str,
  pub description: &'static str,
  pub parameters:  Value,
}

fn scrape_stats_declaration() -> ToolDeclaration {
  ToolDeclaration {
    name:        SCRAPE_STATS,
    description: "Fetch a player statistics table for one stat category, season and competition.",
    parameters:  json!({
      "type": "object",
      "properties": {
        "stat_category": {
          "type": "string",
          "description": "One of: standard, keeper, defensive, shooting, passing, possession.",
        },
        "season": {
          "type": "string",
          "description": "Season formatted YYYY-YYYY, e.g. 2024-2025.",
        },
        "competition": {
          "type": "string",
          "description": "Competition name with spaces replaced by dashes, e.g. Premier-League.",
        },
      },
    }),
  }
}

fn run_sql_declaration() -> ToolDeclaration {
  ToolDeclaration {
    name:        RUN_SQL,
    description: "Run a read-only SQL query against the statistics database. \
                  Must be called with a JSON object: {\"sql_query\": \"SELECT ...;\"}",
    parameters:  json!({
      "type": "object",
      "properties": {
        "sql_query": { "type": "string", "description": "A single SELECT statement." },
      },
      "required": ["sql_query"],
    }),
  }
}

// ─── Requests ────────────────────────────────────────────────────────────────

/// A tool call with its arguments resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
  /// Absent arguments already carry their defaults.
  ScrapeStats {
    category:    String,
    season:      String,
    competition: String,
  },
  RunSql { query: Option<String> },
  Unknown(String),
}

impl ToolRequest {
  /// Interpret a model call. Missing arguments fall back to `standard`,
  /// `current_season` and `Premier-League`; both snake_case and camelCase
  /// argument names are accepted.
  pub fn from_call(call: &ToolCall, current_season: &str) -> Self {
    let arg = |keys: &[&str]| {
      keys
        .iter()
        .find_map(|k| call.args.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
    };

    match call.name.as_str() {
      SCRAPE_STATS => ToolRequest::ScrapeStats {
        category:    arg(&["stat_category", "statCategory"])
          .unwrap_or_else(|| StatCategory::Standard.to_string()),
        season:      arg(&["season"]).unwrap_or_else(|| current_season.to_owned()),
        competition: arg(&["competition"])
          .map(|c| normalize_name(&c))
          .unwrap_or_else(|| DEFAULT_COMPETITION.to_owned()),
      },
      RUN_SQL => ToolRequest::RunSql { query: arg(&["sql_query", "sqlQuery", "query"]) },
      other => ToolRequest::Unknown(other.to_owned()),
    }
  }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// Runs tool requests and renders their results as text.
pub trait ToolDispatch: Send + Sync {
  /// Declarations offered to the decision model.
  fn declarations(&self) -> Vec<ToolDeclaration>;

  fn dispatch(&self, request: ToolRequest) -> impl Future<Output = String> + Send + '_;
}

/// The production dispatcher: a [`StatSource`] for scraping and an optional
/// [`StatsQuery`] for SQL over ingested tables.
pub struct Toolbox<S, Q> {
  source: S,
  stats:  Option<Q>,
}

impl<S: StatSource, Q: StatsQuery> Toolbox<S, Q> {
  pub fn new(source: S, stats: Option<Q>) -> Self { Self { source, stats } }

  async fn scrape(&self, category: &str, season: &str, competition: &str) -> String {
    let category = match StatCategory::parse(category) {
      Ok(c) => c,
      Err(e) => return format!("Scrape error: {e}"),
    };
    match self.source.fetch(category, season, competition).await {
      Ok(records) => to_context(&records),
      Err(e) => {
        tracing::warn!(%category, season, competition, error = %e, "scrape tool failed");
        format!("Scrape error: {e}")
      }
    }
  }

  async fn run_sql(&self, query: Option<&str>) -> String {
    let Some(stats) = &self.stats else { return NO_DATA.to_owned() };
    let Some(query) = query else {
      return "SQL error: no sql_query argument was provided".to_owned();
    };
    match stats.query(query).await {
      Ok(rows) => to_context(&rows),
      Err(e) => {
        tracing::warn!(query, error = %e, "sql tool failed");
        format!("SQL error: {e}")
      }
    }
  }
}

impl<S: StatSource, Q: StatsQuery> ToolDispatch for Toolbox<S, Q> {
  fn declarations(&self) -> Vec<ToolDeclaration> {
    let mut out = vec![scrape_stats_declaration()];
    if self.stats.is_some() {
      out.push(run_sql_declaration());
    }
    out
  }

  async fn dispatch(&self, request: ToolRequest) -> String {
    tracing::info!(?request, "dispatching tool");
    match request {
      ToolRequest::ScrapeStats { category, season, competition } => {
        self.scrape(&category, &season, &competition).await
      }
      ToolRequest::RunSql { query } => self.run_sql(query.as_deref()).await,
      ToolRequest::Unknown(name) => {
        tracing::warn!(tool = %name, "model asked for an unknown tool");
        NO_DATA.to_owned()
      }
    }
  }
}

/// Compact JSON array of records.
fn to_context<T: Serialize>(rows: &[T]) -> String {
  serde_json::to_string(rows).unwrap_or_else(|e| format!("Tool returned unserialisable data: {e}"))
}
