//! Async HTTP client for the touchline chat endpoint.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_stream::try_stream;
use futures::{Stream, StreamExt as _, pin_mut};
use reqwest::Client;
use serde::Deserialize;

/// Name of the event that closes a chat stream.
const END_EVENT: &str = "end-of-stream";

/// One piece of a streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
  Status(String),
  Token(String),
  Error(String),
  /// A bare message, sent instead of an exchange (e.g. an empty question).
  Notice(String),
}

#[derive(Deserialize)]
struct Payload {
  #[serde(rename = "type")]
  kind:    String,
  content: String,
}

/// Async client for `GET /chat`.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ChatClient {
  client:   Client,
  base_url: String,
}

impl ChatClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    // Long enough for a tool call followed by a full generation.
    let client = Client::builder()
      .timeout(Duration::from_secs(300))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_owned() })
  }

  /// `GET /chat?message=<question>`, yielding replies until the server
  /// closes the stream.
  pub async fn ask(&self, question: &str) -> Result<impl Stream<Item = Result<Reply>>> {
    let resp = self
      .client
      .get(format!("{}/chat", self.base_url))
      .query(&[("message", question)])
      .send()
      .await
      .context("GET /chat failed")?;

    if !resp.status().is_success() {
      let status = resp.status();
      let body = resp.text().await.unwrap_or_default();
      return Err(anyhow!("GET /chat → {status}: {body}"));
    }

    Ok(try_stream! {
      let bytes = resp.bytes_stream();
      pin_mut!(bytes);
      let mut decoder = EventDecoder::default();
      let mut buffer: Vec<u8> = Vec::new();

      'read: while let Some(chunk) = bytes.next().await {
        buffer.extend_from_slice(&chunk.context("reading chat stream")?);
        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
          let line: Vec<u8> = buffer.drain(..=pos).collect();
          match decoder.push_line(&String::from_utf8_lossy(&line))? {
            Some(Frame::Reply(reply)) => yield reply,
            Some(Frame::End) => break 'read,
            None => {}
          }
        }
      }
    })
  }
}

// ─── Event-stream decoding ────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum Frame {
  Reply(Reply),
  End,
}

/// Accumulates `event:` and `data:` lines until the blank line that ends an
/// event.
#[derive(Default)]
struct EventDecoder {
  event: Option<String>,
  data:  Vec<String>,
}

impl EventDecoder {
  fn push_line(&mut self, line: &str) -> Result<Option<Frame>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
      return self.dispatch();
    }
    if line.starts_with(':') {
      return Ok(None);
    }
    let (field, value) = line.split_once(':').unwrap_or((line, ""));
    let value = value.strip_prefix(' ').unwrap_or(value);
    match field {
      "event" => self.event = Some(value.to_owned()),
      "data" => self.data.push(value.to_owned()),
      _ => {}
    }
    Ok(None)
  }

  fn dispatch(&mut self) -> Result<Option<Frame>> {
    let event = self.event.take();
    let data = std::mem::take(&mut self.data).join("\n");
    if event.as_deref() == Some(END_EVENT) {
      return Ok(Some(Frame::End));
    }
    if data.is_empty() {
      return Ok(None);
    }

    if let Ok(text) = serde_json::from_str::<String>(&data) {
      return Ok(Some(Frame::Reply(Reply::Notice(text))));
    }
    let payload: Payload =
      serde_json::from_str(&data).with_context(|| format!("unexpected chat event: {data}"))?;
    let reply = match payload.kind.as_str() {
      "status" => Reply::Status(payload.content),
      "token" => Reply::Token(payload.content),
      "error" => Reply::Error(payload.content),
      other => return Err(anyhow!("unknown chat event type {other:?}")),
    };
    Ok(Some(Frame::Reply(reply)))
  }
}
