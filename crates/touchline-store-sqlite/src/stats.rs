//! [`StatsDb`]: ingested stat tables and read-only SQL over them.
//!
//! One table per (category, competition, season), one column per schema
//! column plus `season` and `competition`. Column types are inferred from the
//! scraped strings when the table is created.

use std::{
  collections::BTreeMap,
  path::Path,
  sync::atomic::{AtomicU64, Ordering},
};

use rusqlite::{OpenFlags, OptionalExtension as _, types::Value as SqlValue, types::ValueRef};
use serde_json::{Number, Value};
use touchline_core::{
  record::StatRecord,
  stat::StatCategory,
  store::{QueryRow, StatsQuery},
};

use crate::{Error, Result, schema::HISTORY_TABLE};

/// Most rows returned by a single query.
pub const MAX_QUERY_ROWS: usize = 500;

/// Share of non-null values that must look numeric for a numeric column.
const NUMERIC_SHARE: f64 = 0.95;

/// Statements SQLite reports as read-only that still touch files or
/// transaction state.
const REJECTED_KEYWORDS: &[&str] =
  &["ATTACH", "DETACH", "BEGIN", "COMMIT", "END", "ROLLBACK", "SAVEPOINT", "RELEASE"];

// ─── Naming ──────────────────────────────────────────────────────────────────

/// `standard_Premier_League_2024_2025` for (standard, Premier-League, 2024-2025).
pub fn ingest_table_name(category: StatCategory, competition: &str, season: &str) -> String {
  format!("{category}_{competition}_{season}").replace(['-', ' '], "_")
}

fn check_table_name(name: &str) -> Result<()> {
  let valid = !name.is_empty()
    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    && !name.starts_with(|c: char| c.is_ascii_digit());
  if valid { Ok(()) } else { Err(Error::InvalidTableName(name.to_owned())) }
}

fn quote_ident(ident: &str) -> String { format!("\"{}\"", ident.replace('"', "\"\"")) }

// ─── Column types ────────────────────────────────────────────────────────────

/// Storage type chosen for an ingested column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
  Integer,
  Real,
  Text,
}

impl ColumnType {
  pub fn as_sql(self) -> &'static str {
    match self {
      ColumnType::Integer => "INTEGER",
      ColumnType::Real => "REAL",
      ColumnType::Text => "TEXT",
    }
  }

  fn convert(self, value: Option<&str>) -> SqlValue {
    let Some(raw) = value else { return SqlValue::Null };
    match self {
      ColumnType::Text => SqlValue::Text(raw.to_owned()),
      ColumnType::Integer => numeric_text(raw)
        .and_then(|s| s.parse::<i64>().ok())
        .map_or(SqlValue::Null, SqlValue::Integer),
      ColumnType::Real => numeric_text(raw)
        .and_then(|s| s.parse::<f64>().ok())
        .map_or(SqlValue::Null, SqlValue::Real),
    }
  }
}

/// Strip thousands separators; `None` unless what is left is an optional
/// minus sign and digits with at most one decimal point.
fn numeric_text(raw: &str) -> Option<String> {
  let s: String = raw.trim().chars().filter(|c| *c != ',').collect();
  let digits = s.strip_prefix('-').unwrap_or(&s).replacen('.', "", 1);
  (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())).then_some(s)
}

/// Pick a column type from sampled values. Empty strings count as missing.
///
/// More than 95% numeric-looking values makes the column numeric: `REAL` if
/// any value has a decimal point, else `INTEGER`.
pub fn infer_column_type<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> ColumnType {
  let present: Vec<&str> = values
    .into_iter()
    .flatten()
    .filter(|v| !v.trim().is_empty())
    .collect();
  if present.is_empty() {
    return ColumnType::Text;
  }

  let numeric = present.iter().filter(|v| numeric_text(v).is_some()).count();
  if (numeric as f64) / (present.len() as f64) <= NUMERIC_SHARE {
    return ColumnType::Text;
  }
  if present.iter().any(|v| v.contains('.')) {
    ColumnType::Real
  } else {
    ColumnType::Integer
  }
}

// ─── Statement screening ─────────────────────────────────────────────────────

/// First keyword of `sql`, upper-cased, after leading whitespace and comments.
fn leading_keyword(sql: &str) -> String {
  let mut rest = sql;
  loop {
    rest = rest.trim_start();
    if let Some(r) = rest.strip_prefix("--") {
      rest = r.split_once('\n').map_or("", |(_, r)| r);
    } else if let Some(r) = rest.strip_prefix("/*") {
      rest = r.split_once("*/").map_or("", |(_, r)| r);
    } else {
      break;
    }
  }
  rest
    .chars()
    .take_while(char::is_ascii_alphabetic)
    .collect::<String>()
    .to_ascii_uppercase()
}

// ─── Database ────────────────────────────────────────────────────────────────

static MEMORY_DB_SEQ: AtomicU64 = AtomicU64::new(0);

/// Store of ingested stat tables.
///
/// Ingestion writes through `conn`; [`StatsDb::query`] runs on `reader`, a
/// second connection opened read-only. Cloning is cheap; both connections
/// are reference-counted.
#[derive(Clone)]
pub struct StatsDb {
  conn:   tokio_rusqlite::Connection,
  reader: tokio_rusqlite::Connection,
}

impl StatsDb {
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let reader = tokio_rusqlite::Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .await?;
    Ok(Self { conn, reader })
  }

  /// A private in-memory database, shared between the writer and the
  /// read-only connection through SQLite's shared cache.
  pub async fn open_in_memory() -> Result<Self> {
    let uri = format!(
      "file:touchline-stats-{}-{}?mode=memory&cache=shared",
      std::process::id(),
      MEMORY_DB_SEQ.fetch_add(1, Ordering::Relaxed)
    );
    let conn = tokio_rusqlite::Connection::open_with_flags(
      &uri,
      OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .await?;
    let reader = tokio_rusqlite::Connection::open_with_flags(
      &uri,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .await?;
    Ok(Self { conn, reader })
  }

  /// Whether a table called `name` exists. Case is ignored, as SQLite does
  /// for identifiers.
  pub async fn table_exists(&self, name: &str) -> Result<bool> {
    let name = name.to_owned();
    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
              rusqlite::params![name],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }

  /// Create `name` from `records` and insert them all in one transaction.
  /// Returns the number of rows stored.
  pub async fn create_table(&self, name: &str, records: &[StatRecord]) -> Result<usize> {
    check_table_name(name)?;
    let first = records.first().ok_or_else(|| Error::NoRows(name.to_owned()))?;

    let columns: Vec<String> = first.columns().map(str::to_owned).collect();
    let types: Vec<ColumnType> = (0..columns.len())
      .map(|i| infer_column_type(records.iter().map(|r| r.cells().nth(i).flatten())))
      .collect();

    let create = format!(
      "CREATE TABLE {} ({})",
      quote_ident(name),
      columns
        .iter()
        .zip(&types)
        .map(|(c, t)| format!("{} {}", quote_ident(c), t.as_sql()))
        .collect::<Vec<_>>()
        .join(", ")
    );
    let insert = format!(
      "INSERT INTO {} VALUES ({})",
      quote_ident(name),
      vec!["?"; columns.len()].join(", ")
    );
    let rows: Vec<Vec<SqlValue>> = records
      .iter()
      .map(|r| r.cells().zip(&types).map(|(v, t)| t.convert(v)).collect())
      .collect();

    let stored = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(&create, [])?;
        {
          let mut stmt = tx.prepare(&insert)?;
          for row in &rows {
            stmt.execute(rusqlite::params_from_iter(row))?;
          }
        }
        tx.commit()?;
        Ok(rows.len())
      })
      .await?;

    tracing::info!(table = name, rows = stored, "stored stat table");
    Ok(stored)
  }

  /// Every stat table with its columns and declared types.
  pub async fn describe(&self) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
    let described = self
      .conn
      .call(|conn| {
        let mut tables_stmt = conn.prepare(
          "SELECT name FROM sqlite_master
           WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != ?1
           ORDER BY name",
        )?;
        let tables = tables_stmt
          .query_map(rusqlite::params![HISTORY_TABLE], |row| row.get::<_, String>(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = BTreeMap::new();
        for table in tables {
          let mut info = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(&table)))?;
          let columns = info
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
          out.insert(table, columns);
        }
        Ok(out)
      })
      .await?;
    Ok(described)
  }

  /// Run a read-only statement and return at most [`MAX_QUERY_ROWS`] rows.
  ///
  /// Statements that write, attach databases or control transactions are
  /// refused with [`Error::ReadOnly`].
  pub async fn query(&self, sql: &str) -> Result<Vec<QueryRow>> {
    if REJECTED_KEYWORDS.contains(&leading_keyword(sql).as_str()) {
      return Err(Error::ReadOnly);
    }
    let sql = sql.to_owned();
    let rows = self
      .reader
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        if !stmt.readonly() {
          return Ok(None);
        }
        let names: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();

        let mut out = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
          if out.len() == MAX_QUERY_ROWS {
            break;
          }
          let mut obj = QueryRow::new();
          for (i, name) in names.iter().enumerate() {
            obj.insert(name.clone(), json_value(row.get_ref(i)?));
          }
          out.push(obj);
        }
        Ok(Some(out))
      })
      .await?;

    rows.ok_or(Error::ReadOnly)
  }
}

fn json_value(value: ValueRef<'_>) -> Value {
  match value {
    ValueRef::Null => Value::Null,
    ValueRef::Integer(i) => Value::from(i),
    ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
    ValueRef::Text(t) | ValueRef::Blob(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
  }
}

impl StatsQuery for StatsDb {
  type Error = Error;

  async fn schema_json(&self) -> Result<String> {
    let described = self.describe().await?;
    Ok(serde_json::to_string_pretty(&described)?)
  }

  async fn query(&self, sql: &str) -> Result<Vec<QueryRow>> { StatsDb::query(self, sql).await }
}
