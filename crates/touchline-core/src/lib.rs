//! Core types and trait definitions for Touchline.
//!
//! No HTTP or database dependencies. The scraper, the stores, the chat
//! pipeline and the server all build on it.

// Seam traits spell out `Send` on their futures; implementors use `async fn`.
#![allow(async_fn_in_trait)]

pub mod competition;
pub mod conversation;
pub mod error;
pub mod record;
pub mod stat;
pub mod store;

pub use error::{Error, Result};
