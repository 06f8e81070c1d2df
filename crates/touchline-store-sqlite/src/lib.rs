//! SQLite backends for Touchline.
//!
//! [`SqliteConversationStore`] is the server-side conversation history.
//! [`StatsDb`] holds ingested stat tables and answers read-only SQL.
//!
//! Both wrap [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime.

mod encode;
mod schema;
mod stats;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use stats::{ColumnType, MAX_QUERY_ROWS, StatsDb, infer_column_type, ingest_table_name};
pub use store::SqliteConversationStore;
