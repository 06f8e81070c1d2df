//! [`Orchestrator`]: one question in, a stream of [`ChatEvent`]s out.
//!
//! Each exchange runs in its own task:
//!
//! 1. read the session history and record the question,
//! 2. ask the model for a decision and dispatch at most one tool,
//! 3. emit a status event, re-read the history and render the answer prompt,
//! 4. forward every generated token as it arrives,
//! 5. record the answer once the stream has completed in full.
//!
//! If the consumer goes away or generation fails part way, no answer is
//! recorded. Exchanges on the same session are serialised.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use futures::StreamExt as _;
use tokio::sync::{OwnedMutexGuard, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use touchline_core::{
  conversation::{Role, SessionId, flatten_history},
  store::ConversationStore,
};

use crate::{
  Error, Result,
  model::{Decision, DecisionRequest, LanguageModel},
  prompt::PromptConfig,
  tools::{ToolDispatch, ToolRequest},
};

pub const STATUS_MESSAGE: &str = "🤖 **Assistant:** *Analyzing data and generating your answer...*";

const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// What the transport forwards to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
  Status(String),
  Token(String),
  Error(String),
  /// Always the last event of an exchange.
  End,
}

// ─── Session locks ───────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct SessionLocks {
  inner: Arc<Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SessionLocks {
  async fn acquire(&self, session: &SessionId) -> OwnedMutexGuard<()> {
    let lock = {
      let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
      map.retain(|_, l| Arc::strong_count(l) > 1);
      map.entry(session.clone()).or_default().clone()
    };
    lock.lock_owned().await
  }
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// Runs exchanges against a model and a tool dispatcher. The conversation
/// store is passed per exchange so each request can bring its own backend.
pub struct Orchestrator<M, T> {
  model:    Arc<M>,
  tools:    Arc<T>,
  prompt:   Arc<PromptConfig>,
  locks:    SessionLocks,
  capacity: usize,
}

impl<M, T> Clone for Orchestrator<M, T> {
  fn clone(&self) -> Self {
    Self {
      model:    Arc::clone(&self.model),
      tools:    Arc::clone(&self.tools),
      prompt:   Arc::clone(&self.prompt),
      locks:    self.locks.clone(),
      capacity: self.capacity,
    }
  }
}

impl<M, T> Orchestrator<M, T>
where
  M: LanguageModel + 'static,
  T: ToolDispatch + 'static,
{
  pub fn new(model: M, tools: T, prompt: PromptConfig) -> Self {
    Self {
      model:    Arc::new(model),
      tools:    Arc::new(tools),
      prompt:   Arc::new(prompt),
      locks:    SessionLocks::default(),
      capacity: DEFAULT_CHANNEL_CAPACITY,
    }
  }

  /// Bound on events buffered ahead of the consumer.
  pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity.max(1);
    self
  }

  pub fn prompt(&self) -> &PromptConfig { &self.prompt }

  /// Start an exchange and return its events. Dropping the stream cancels
  /// the exchange at its next event.
  pub fn exchange<C>(
    &self,
    store: Arc<C>,
    session: SessionId,
    question: String,
  ) -> ReceiverStream<ChatEvent>
  where
    C: ConversationStore + 'static,
  {
    let (tx, rx) = mpsc::channel(self.capacity);
    let this = self.clone();

    tokio::spawn(async move {
      let _guard = this.locks.acquire(&session).await;
      if let Err(e) = this.run(&*store, &session, &question, &tx).await {
        tracing::error!(session = %session, error = %e, "exchange failed");
        let _ = tx.send(ChatEvent::Error(e.to_string())).await;
      }
      let _ = tx.send(ChatEvent::End).await;
    });

    ReceiverStream::new(rx)
  }

  /// Run an exchange to completion and return the full answer.
  pub async fn answer<C>(&self, store: Arc<C>, session: SessionId, question: String) -> Result<String>
  where
    C: ConversationStore + 'static,
  {
    let mut events = self.exchange(store, session, question);
    let mut answer = String::new();
    while let Some(event) = events.next().await {
      match event {
        ChatEvent::Token(t) => answer.push_str(&t),
        ChatEvent::Error(e) => return Err(Error::Exchange(e)),
        ChatEvent::Status(_) => {}
        ChatEvent::End => break,
      }
    }
    Ok(answer)
  }

  async fn run<C: ConversationStore>(
    &self,
    store: &C,
    session: &SessionId,
    question: &str,
    tx: &mpsc::Sender<ChatEvent>,
  ) -> Result<()> {
    let history = store.recent(session).await.map_err(Error::store)?;
    store
      .append(session, Role::User, question)
      .await
      .map_err(Error::store)?;

    let declarations = self.tools.declarations();
    let decision = self
      .model
      .decide(DecisionRequest {
        system: self.prompt.decision_instruction(),
        history: &history,
        question,
        tools: &declarations,
      })
      .await?;

    let context = match decision {
      Decision::Direct(text) => text,
      Decision::Tool(call) => {
        let request = ToolRequest::from_call(&call, self.prompt.current_season());
        let result = self.tools.dispatch(request).await;
        store
          .append(session, Role::Tool, &result)
          .await
          .map_err(Error::store)?;
        result
      }
    };

    if tx.send(ChatEvent::Status(STATUS_MESSAGE.to_owned())).await.is_err() {
      tracing::debug!(session = %session, "consumer left before generation");
      return Ok(());
    }

    let history = store.recent(session).await.map_err(Error::store)?;
    let prompt = self
      .prompt
      .answer_prompt(&flatten_history(&history), &context, question);

    let mut tokens = self.model.generate(&prompt).await?;
    let mut answer = String::new();
    while let Some(token) = tokens.next().await {
      let token = token?;
      if token.is_empty() {
        continue;
      }
      answer.push_str(&token);
      if tx.send(ChatEvent::Token(token)).await.is_err() {
        tracing::debug!(session = %session, "consumer left mid-stream, answer discarded");
        return Ok(());
      }
    }

    store
      .append(session, Role::Assistant, &answer)
      .await
      .map_err(Error::store)?;
    tracing::info!(session = %session, chars = answer.len(), "exchange complete");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use futures::stream;
  use serde_json::Map;
  use touchline_core::{
    competition::CompetitionDirectory,
    conversation::ConversationTurn,
  };

  use super::*;
  use crate::{
    model::{TokenStream, ToolCall},
    tools::{SCRAPE_STATS, ToolDeclaration},
  };

  // ─── Fakes ───────────────────────────────────────────────────────────────

  #[derive(Debug, thiserror::Error)]
  #[error("store unavailable")]
  struct StoreDown;

  #[derive(Default)]
  struct MemoryStore {
    turns: Mutex<Vec<(SessionId, ConversationTurn)>>,
    fail:  bool,
  }

  impl MemoryStore {
    fn roles(&self, session: &SessionId) -> Vec<(Role, String)> {
      self
        .turns
        .lock()
        .unwrap()
        .iter()
        .filter(|(s, _)| s == session)
        .map(|(_, t)| (t.role, t.content.clone()))
        .collect()
    }
  }

  impl ConversationStore for MemoryStore {
    type Error = StoreDown;

    async fn append(
      &self,
      session: &SessionId,
      role: Role,
      content: &str,
    ) -> Result<ConversationTurn, StoreDown> {
      if self.fail {
        return Err(StoreDown);
      }
      let turn = ConversationTurn::new(role, content);
      self.turns.lock().unwrap().push((session.clone(), turn.clone()));
      Ok(turn)
    }

    async fn recent(&self, session: &SessionId) -> Result<Vec<ConversationTurn>, StoreDown> {
      if self.fail {
        return Err(StoreDown);
      }
      Ok(
        self
          .turns
          .lock()
          .unwrap()
          .iter()
          .filter(|(s, _)| s == session)
          .map(|(_, t)| t.clone())
          .collect(),
      )
    }

    async fn clear(&self, _session: &SessionId) -> Result<(), StoreDown> {
      self.turns.lock().unwrap().clear();
      Ok(())
    }
  }

  /// Returns `decision` and streams the next script of tokens per call.
  struct ScriptedModel {
    decision: Decision,
    scripts:  Mutex<Vec<Vec<Result<String>>>>,
    prompts:  Mutex<Vec<String>>,
    seen:     Mutex<Vec<usize>>,
  }

  impl ScriptedModel {
    fn new(decision: Decision, scripts: Vec<Vec<&str>>) -> Self {
      Self {
        decision,
        scripts: Mutex::new(
          scripts
            .into_iter()
            .rev()
            .map(|s| s.into_iter().map(|t| Ok(t.to_owned())).collect())
            .collect(),
        ),
        prompts: Mutex::default(),
        seen: Mutex::default(),
      }
    }
  }

  impl LanguageModel for ScriptedModel {
    async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision> {
      self.seen.lock().unwrap().push(request.history.len());
      Ok(self.decision.clone())
    }

    async fn generate(&self, prompt: &str) -> Result<TokenStream> {
      self.prompts.lock().unwrap().push(prompt.to_owned());
      let script = self.scripts.lock().unwrap().pop().unwrap_or_default();
      Ok(stream::iter(script).boxed())
    }
  }

  #[derive(Default)]
  struct CountingTools {
    calls: AtomicUsize,
  }

  impl ToolDispatch for CountingTools {
    fn declarations(&self) -> Vec<ToolDeclaration> { Vec::new() }

    async fn dispatch(&self, request: ToolRequest) -> String {
      self.calls.fetch_add(1, Ordering::SeqCst);
      match request {
        ToolRequest::ScrapeStats { competition, .. } => {
          format!(r#"[{{"name":"Cole Palmer","goals":"22","competition":"{competition}"}}]"#)
        }
        _ => "Tool returned no data.".to_owned(),
      }
    }
  }

  fn prompt() -> PromptConfig { PromptConfig::new("2024-2025", &CompetitionDirectory::default(), None) }

  fn scrape_call() -> Decision {
    Decision::Tool(ToolCall { name: SCRAPE_STATS.into(), args: Map::new() })
  }

  async fn collect(events: ReceiverStream<ChatEvent>) -> Vec<ChatEvent> { events.collect().await }

  fn tokens(events: &[ChatEvent]) -> String {
    events
      .iter()
      .filter_map(|e| match e {
        ChatEvent::Token(t) => Some(t.as_str()),
        _ => None,
      })
      .collect()
  }

  // ─── Tests ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn direct_answers_never_touch_the_tools() {
    let model = ScriptedModel::new(Decision::Direct("Hello!".into()), vec![vec!["Hi ", "there."]]);
    let orch = Orchestrator::new(model, CountingTools::default(), prompt());
    let store = Arc::new(MemoryStore::default());
    let session = SessionId::generate();

    let events = collect(orch.exchange(store.clone(), session.clone(), "hello".into())).await;

    assert_eq!(orch.tools.calls.load(Ordering::SeqCst), 0);
    assert_eq!(events.first(), Some(&ChatEvent::Status(STATUS_MESSAGE.into())));
    assert_eq!(events.last(), Some(&ChatEvent::End));
    assert_eq!(store.roles(&session), [
      (Role::User, "hello".to_owned()),
      (Role::Assistant, "Hi there.".to_owned()),
    ]);
    let prompts = orch.model.prompts.lock().unwrap();
    assert!(prompts[0].contains("Context:\nHello!\n"));
  }

  #[tokio::test]
  async fn tool_results_become_context_and_are_recorded() {
    let model = ScriptedModel::new(scrape_call(), vec![vec!["**Cole Palmer** ", "leads."]]);
    let orch = Orchestrator::new(model, CountingTools::default(), prompt());
    let store = Arc::new(MemoryStore::default());
    let session = SessionId::generate();

    let events = collect(orch.exchange(store.clone(), session.clone(), "Top scorer?".into())).await;

    assert_eq!(orch.tools.calls.load(Ordering::SeqCst), 1);
    let turns = store.roles(&session);
    let roles: Vec<_> = turns.iter().map(|(r, _)| *r).collect();
    assert_eq!(roles, [Role::User, Role::Tool, Role::Assistant]);
    assert!(turns[1].1.contains("Premier-League"));
    assert_eq!(turns[2].1, "**Cole Palmer** leads.");
    assert_eq!(tokens(&events), turns[2].1);

    let prompts = orch.model.prompts.lock().unwrap();
    assert!(prompts[0].contains(&format!("Context:\n{}\n", turns[1].1)));
    assert!(prompts[0].contains("user: Top scorer?\ntool: [{"));
  }

  #[tokio::test]
  async fn emitted_tokens_equal_the_recorded_answer() {
    let pieces = vec!["# Top", " scorers\n\n", "* ", "**Salah**", " 🏆", ""];
    let model = ScriptedModel::new(Decision::Direct(String::new()), vec![pieces]);
    let orch = Orchestrator::new(model, CountingTools::default(), prompt());
    let store = Arc::new(MemoryStore::default());
    let session = SessionId::generate();

    let events = collect(orch.exchange(store.clone(), session.clone(), "q".into())).await;
    let token_events = events.iter().filter(|e| matches!(e, ChatEvent::Token(_))).count();

    assert_eq!(token_events, 5);
    let answer = store.roles(&session).pop().unwrap();
    assert_eq!(answer, (Role::Assistant, tokens(&events)));
  }

  #[tokio::test]
  async fn decision_sees_history_from_before_the_question() {
    let model = ScriptedModel::new(Decision::Direct("ok".into()), vec![vec!["one"], vec!["two"]]);
    let orch = Orchestrator::new(model, CountingTools::default(), prompt());
    let store = Arc::new(MemoryStore::default());
    let session = SessionId::generate();

    collect(orch.exchange(store.clone(), session.clone(), "first".into())).await;
    collect(orch.exchange(store.clone(), session.clone(), "second".into())).await;

    assert_eq!(*orch.model.seen.lock().unwrap(), [0, 2]);
  }

  #[tokio::test]
  async fn abandoned_streams_record_no_answer() {
    let model = ScriptedModel::new(
      Decision::Direct(String::new()),
      vec![vec!["a", "b", "c", "d", "e", "f"], vec!["done"]],
    );
    let orch = Orchestrator::new(model, CountingTools::default(), prompt()).with_channel_capacity(1);
    let store = Arc::new(MemoryStore::default());
    let session = SessionId::generate();

    let mut events = orch.exchange(store.clone(), session.clone(), "first".into());
    assert!(matches!(events.next().await, Some(ChatEvent::Status(_))));
    assert_eq!(events.next().await, Some(ChatEvent::Token("a".into())));
    drop(events);

    // Same session, so this waits for the abandoned exchange to finish.
    collect(orch.exchange(store.clone(), session.clone(), "second".into())).await;

    let answers: Vec<_> = store
      .roles(&session)
      .into_iter()
      .filter(|(r, _)| *r == Role::Assistant)
      .map(|(_, c)| c)
      .collect();
    assert_eq!(answers, ["done"]);
  }

  #[tokio::test]
  async fn generation_failure_ends_with_an_error_and_records_nothing() {
    let model = ScriptedModel::new(Decision::Direct(String::new()), vec![]);
    model.scripts.lock().unwrap().push(vec![
      Ok("partial".to_owned()),
      Err(Error::Api { code: 500, message: "backend exploded".into() }),
    ]);
    let orch = Orchestrator::new(model, CountingTools::default(), prompt());
    let store = Arc::new(MemoryStore::default());
    let session = SessionId::generate();

    let events = collect(orch.exchange(store.clone(), session.clone(), "q".into())).await;

    assert!(matches!(&events[events.len() - 2], ChatEvent::Error(m) if m.contains("backend exploded")));
    assert_eq!(events.last(), Some(&ChatEvent::End));
    assert_eq!(store.roles(&session), [(Role::User, "q".to_owned())]);
  }

  #[tokio::test]
  async fn store_failure_is_reported() {
    let model = ScriptedModel::new(Decision::Direct(String::new()), vec![vec!["x"]]);
    let orch = Orchestrator::new(model, CountingTools::default(), prompt());
    let store = Arc::new(MemoryStore { fail: true, ..Default::default() });

    let events = collect(orch.exchange(store, SessionId::generate(), "q".into())).await;
    assert!(matches!(&events[..], [ChatEvent::Error(_), ChatEvent::End]));

    let store = Arc::new(MemoryStore { fail: true, ..Default::default() });
    let err = orch.answer(store, SessionId::generate(), "q".into()).await.unwrap_err();
    assert!(matches!(err, Error::Exchange(m) if m.contains("store unavailable")));
  }

  #[tokio::test]
  async fn answer_collects_the_tokens() {
    let model = ScriptedModel::new(Decision::Direct(String::new()), vec![vec!["Mo ", "Salah"]]);
    let orch = Orchestrator::new(model, CountingTools::default(), prompt());
    let store = Arc::new(MemoryStore::default());

    let answer = orch.answer(store, SessionId::generate(), "q".into()).await.unwrap();
    assert_eq!(answer, "Mo Salah");
  }
}
