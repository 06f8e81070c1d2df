//! [`GeminiClient`]: the Google Gemini [`LanguageModel`].
//!
//! The decision step calls `generateContent` with function declarations; the
//! answer is streamed from `streamGenerateContent?alt=sse`.

use std::time::Duration;

use async_stream::try_stream;
use futures::{Stream, StreamExt as _, pin_mut};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use touchline_core::conversation::{ConversationTurn, Role};

use crate::{
  Error, Result,
  model::{Decision, DecisionRequest, LanguageModel, TokenStream, ToolCall},
  tools::ToolDeclaration,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const API_KEY_HEADER: &str = "x-goog-api-key";

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GeminiConfig {
  pub api_key:  String,
  pub model:    String,
  pub base_url: String,
  /// Connect timeout, whole-request timeout for decisions, and the longest
  /// gap allowed between two chunks of a streamed answer.
  pub timeout:  Duration,
}

impl GeminiConfig {
  /// Falls back to `GOOGLE_API_KEY` when `api_key` is `None`.
  pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
    let api_key = api_key
      .filter(|k| !k.is_empty())
      .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
      .unwrap_or_default();
    Self {
      api_key,
      model: model.into(),
      base_url: DEFAULT_BASE_URL.to_owned(),
      timeout: Duration::from_secs(120),
    }
  }

  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<Content>,
  contents:           Vec<Content>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  tools:              Vec<Tools<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tools<'a> {
  function_declarations: &'a [ToolDeclaration],
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
  #[serde(skip_serializing_if = "Option::is_none")]
  role:  Option<String>,
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
  #[serde(skip_serializing_if = "Option::is_none")]
  text:          Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  function_call: Option<FunctionCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
  name: String,
  #[serde(default)]
  args: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
  content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
  error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
  code:    u16,
  message: String,
}

impl Content {
  fn text(role: Option<&str>, text: impl Into<String>) -> Self {
    Self {
      role:  role.map(str::to_owned),
      parts: vec![Part { text: Some(text.into()), ..Default::default() }],
    }
  }
}

impl GenerateResponse {
  fn parts(self) -> impl Iterator<Item = Part> {
    self
      .candidates
      .into_iter()
      .take(1)
      .flat_map(|c| c.content)
      .flat_map(|c| c.parts)
  }
}

/// Map stored turns onto Gemini's two roles. Tool results are sent as user
/// text; consecutive turns with the same role share one content entry.
fn history_contents(history: &[ConversationTurn], question: &str) -> Vec<Content> {
  let mut out: Vec<Content> = Vec::with_capacity(history.len() + 1);
  let turns = history
    .iter()
    .map(|t| match t.role {
      Role::User => ("user", t.content.clone()),
      Role::Assistant => ("model", t.content.clone()),
      Role::Tool => ("user", format!("[tool result]\n{}", t.content)),
    })
    .chain([("user", question.to_owned())]);

  for (role, text) in turns {
    let part = Part { text: Some(text), ..Default::default() };
    match out.last_mut() {
      Some(last) if last.role.as_deref() == Some(role) => last.parts.push(part),
      _ => out.push(Content { role: Some(role.to_owned()), parts: vec![part] }),
    }
  }
  out
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Gemini client. Cheap to clone; every call is one request with no retry.
#[derive(Debug, Clone)]
pub struct GeminiClient {
  client: Client,
  config: GeminiConfig,
}

impl GeminiClient {
  pub fn new(config: GeminiConfig) -> Result<Self> {
    if config.api_key.is_empty() {
      return Err(Error::MissingApiKey);
    }
    // Streamed answers are bounded per chunk, not as a whole.
    let client = Client::builder().connect_timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  fn url(&self, method: &str) -> String {
    format!(
      "{}/models/{}:{method}",
      self.config.base_url.trim_end_matches('/'),
      self.config.model
    )
  }

  /// POST `body`. With `deadline`, the whole exchange including the response
  /// body must finish in time.
  async fn post(
    &self,
    url: &str,
    body: &GenerateRequest<'_>,
    deadline: Option<Duration>,
  ) -> Result<Response> {
    let mut request = self
      .client
      .post(url)
      .header(API_KEY_HEADER, &self.config.api_key)
      .json(body);
    if let Some(deadline) = deadline {
      request = request.timeout(deadline);
    }
    let response = tokio::time::timeout(self.config.timeout, request.send())
      .await
      .map_err(|_| Error::Stalled(self.config.timeout))??;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let (code, message) = serde_json::from_str::<ErrorResponse>(&body)
      .ok()
      .and_then(|e| e.error)
      .map(|e| (e.code, e.message))
      .unwrap_or((status.as_u16(), body));
    tracing::error!(code, %message, "Gemini API error");
    Err(Error::Api { code, message })
  }
}

impl LanguageModel for GeminiClient {
  async fn decide(&self, request: DecisionRequest<'_>) -> Result<Decision> {
    let body = GenerateRequest {
      system_instruction: Some(Content::text(None, request.system)),
      contents:           history_contents(request.history, request.question),
      tools:              if request.tools.is_empty() {
        Vec::new()
      } else {
        vec![Tools { function_declarations: request.tools }]
      },
    };

    let response: GenerateResponse = self
      .post(&self.url("generateContent"), &body, Some(self.config.timeout))
      .await?
      .json()
      .await?;
    if response.candidates.is_empty() {
      return Err(Error::EmptyResponse);
    }

    let mut text = String::new();
    for part in response.parts() {
      if let Some(call) = part.function_call {
        tracing::debug!(tool = %call.name, "model requested a tool");
        return Ok(Decision::Tool(ToolCall { name: call.name, args: call.args }));
      }
      text.extend(part.text);
    }
    Ok(Decision::Direct(text))
  }

  async fn generate(&self, prompt: &str) -> Result<TokenStream> {
    let body = GenerateRequest {
      system_instruction: None,
      contents:           vec![Content::text(Some("user"), prompt)],
      tools:              Vec::new(),
    };
    let response = self
      .post(&self.url("streamGenerateContent?alt=sse"), &body, None)
      .await?;
    Ok(sse_tokens(response, self.config.timeout).boxed())
  }
}

/// Split a server-sent event body into answer fragments. Lines are buffered
/// as bytes so multi-byte characters split across chunks survive. The stream
/// fails once no chunk arrives for `idle`.
fn sse_tokens(
  response: Response,
  idle: Duration,
) -> impl Stream<Item = Result<String>> + Send + 'static {
  try_stream! {
    let bytes = response.bytes_stream();
    pin_mut!(bytes);
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = tokio::time::timeout(idle, bytes.next())
      .await
      .map_err(|_| Error::Stalled(idle))?
    {
      buffer.extend_from_slice(&chunk?);
      while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        for text in event_texts(&String::from_utf8_lossy(&line))? {
          yield text;
        }
      }
    }
    for text in event_texts(&String::from_utf8_lossy(&buffer))? {
      yield text;
    }
  }
}

fn event_texts(line: &str) -> Result<Vec<String>> {
  let Some(data) = line.trim().strip_prefix("data:") else { return Ok(Vec::new()) };
  let data = data.trim();
  if data.is_empty() {
    return Ok(Vec::new());
  }
  let chunk: GenerateResponse = serde_json::from_str(data)?;
  Ok(
    chunk
      .parts()
      .filter_map(|p| p.text)
      .filter(|t| !t.is_empty())
      .collect(),
  )
}
