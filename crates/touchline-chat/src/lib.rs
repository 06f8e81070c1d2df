//! The chat pipeline for Touchline.
//!
//! [`Orchestrator`] runs one exchange: it reads the session history, asks a
//! [`LanguageModel`] whether data is needed, dispatches at most one tool
//! through a [`ToolDispatch`], then streams the generated answer as
//! [`ChatEvent`]s and records the turns in a
//! [`ConversationStore`](touchline_core::store::ConversationStore).

#![allow(async_fn_in_trait)]

pub mod error;
pub mod gemini;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod tools;

pub use error::{Error, Result};
pub use gemini::{GeminiClient, GeminiConfig};
pub use model::{Decision, DecisionRequest, LanguageModel, TokenStream, ToolCall};
pub use orchestrator::{ChatEvent, Orchestrator, STATUS_MESSAGE};
pub use prompt::PromptConfig;
pub use tools::{ToolDeclaration, ToolDispatch, ToolRequest, Toolbox};
