//! [`ClientHeldStore`]: conversation history carried in the session cookie.
//!
//! The store lives for one request: it is seeded from the verified cookie,
//! handed to the orchestrator, and its turns are written back into the
//! re-issued cookie. Only dialogue turns are kept; tool results are dropped.

use std::{
  convert::Infallible,
  sync::{Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use touchline_core::{
  conversation::{ConversationTurn, HISTORY_LIMIT, Role, SessionId},
  store::ConversationStore,
};

/// A turn as serialised into the cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldTurn {
  pub role:    Role,
  pub content: String,
}

#[derive(Debug, Default)]
pub struct ClientHeldStore {
  turns: Mutex<Vec<HeldTurn>>,
}

impl ClientHeldStore {
  /// Seed from a cookie. Tool turns and anything past the newest
  /// [`HISTORY_LIMIT`] are discarded.
  pub fn new(turns: Vec<HeldTurn>) -> Self {
    let mut turns: Vec<HeldTurn> = turns.into_iter().filter(|t| t.role.is_dialogue()).collect();
    prune(&mut turns);
    Self { turns: Mutex::new(turns) }
  }

  pub fn snapshot(&self) -> Vec<HeldTurn> { self.lock().clone() }

  fn lock(&self) -> std::sync::MutexGuard<'_, Vec<HeldTurn>> {
    self.turns.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

fn prune(turns: &mut Vec<HeldTurn>) {
  let excess = turns.len().saturating_sub(HISTORY_LIMIT);
  turns.drain(..excess);
}

impl ConversationStore for ClientHeldStore {
  type Error = Infallible;

  async fn append(
    &self,
    _session: &SessionId,
    role: Role,
    content: &str,
  ) -> Result<ConversationTurn, Infallible> {
    if role.is_dialogue() {
      let mut turns = self.lock();
      turns.push(HeldTurn { role, content: content.to_owned() });
      prune(&mut turns);
    }
    Ok(ConversationTurn::new(role, content))
  }

  async fn recent(&self, _session: &SessionId) -> Result<Vec<ConversationTurn>, Infallible> {
    Ok(
      self
        .lock()
        .iter()
        .map(|t| ConversationTurn::new(t.role, t.content.clone()))
        .collect(),
    )
  }

  async fn clear(&self, _session: &SessionId) -> Result<(), Infallible> {
    self.lock().clear();
    Ok(())
  }
}
