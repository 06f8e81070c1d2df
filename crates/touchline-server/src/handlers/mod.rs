//! Route handlers, one module per endpoint group.

mod chat;
mod clear;
mod index;

pub use chat::{APOLOGY, ChatReply, ChatRequest, chat_json, chat_stream};
pub use clear::{CLEARED_MESSAGE, clear_history};
pub use index::index;
