//! fbref.com table scraping for Touchline.
//!
//! [`extract`] turns an HTML document into [`StatRecord`]s using a category's
//! column schema; it is pure and synchronous. [`FbrefClient`] builds the page
//! address for a (category, season, competition), fetches it and extracts.
//!
//! # Quick start
//!
//! ```no_run
//! use touchline_core::stat::StatCategory;
//! use touchline_fbref::extract;
//!
//! let html = std::fs::read_to_string("stats.html").unwrap();
//! let rows = extract(&html, StatCategory::Standard.schema(), "2024-2025", "Premier-League").unwrap();
//! println!("{} players", rows.len());
//! ```
//!
//! [`StatRecord`]: touchline_core::record::StatRecord

mod client;
pub mod error;
mod extract;

pub use client::{DEFAULT_BASE_URL, FbrefClient, FbrefConfig};
pub use error::{ExtractionError, SourceError};
pub use extract::extract;
