//! Conversation types: roles, turns and session identifiers.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// Most turns a session retains.
pub const HISTORY_LIMIT: usize = 10;

/// Who authored a turn.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  AsRefStr,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  User,
  Assistant,
  /// Intermediate data fetched for the assistant.
  Tool,
}

impl Role {
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownRole(s.to_owned()))
  }

  /// Whether the turn is part of the visible dialogue.
  pub fn is_dialogue(self) -> bool {
    match self {
      Role::User | Role::Assistant => true,
      Role::Tool => false,
    }
  }
}

/// One role-tagged message of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
  pub role:       Role,
  pub content:    String,
  pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
  pub fn new(role: Role, content: impl Into<String>) -> Self {
    Self { role, content: content.into(), created_at: Utc::now() }
  }
}

/// Flatten turns into `"role: content"` lines joined by newlines.
pub fn flatten_history(turns: &[ConversationTurn]) -> String {
  turns
    .iter()
    .map(|t| format!("{}: {}", t.role, t.content))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Opaque per-client session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
  /// Issue a fresh identifier.
  pub fn generate() -> Self { Self(Uuid::new_v4().to_string()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl From<String> for SessionId {
  fn from(s: String) -> Self { Self(s) }
}

impl From<&str> for SessionId {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl fmt::Display for SessionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}
