//! The language-model seam used by the orchestrator.

use std::future::Future;

use futures::stream::BoxStream;
use serde_json::{Map, Value};
use touchline_core::conversation::ConversationTurn;

use crate::{Result, tools::ToolDeclaration};

/// Answer tokens in the order the model produced them.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// A single function call requested by the decision step.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
  pub name: String,
  pub args: Map<String, Value>,
}

/// What the decision step chose to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
  /// Free text; used as the answer context as-is.
  Direct(String),
  /// The first tool call the model asked for.
  Tool(ToolCall),
}

/// Everything the decision step sees.
#[derive(Debug, Clone, Copy)]
pub struct DecisionRequest<'a> {
  pub system:   &'a str,
  pub history:  &'a [ConversationTurn],
  pub question: &'a str,
  pub tools:    &'a [ToolDeclaration],
}

/// A model able to pick a tool and to stream an answer.
pub trait LanguageModel: Send + Sync {
  fn decide<'a>(
    &'a self,
    request: DecisionRequest<'a>,
  ) -> impl Future<Output = Result<Decision>> + Send + 'a;

  /// Start generating an answer for a fully rendered prompt.
  fn generate<'a>(&'a self, prompt: &'a str) -> impl Future<Output = Result<TokenStream>> + Send + 'a;
}
