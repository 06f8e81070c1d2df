//! Signed session cookie and its extractor.
//!
//! The cookie value is `base64url(json).base64url(hmac_sha256(json))`. A
//! cookie that is missing, malformed or carries a bad signature is ignored
//! and a fresh session is started.

use std::{convert::Infallible, sync::Arc};

use axum::{
  extract::{FromRef, FromRequestParts},
  http::{HeaderMap, HeaderValue, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use touchline_core::conversation::SessionId;

use crate::{
  error::{Error, Result},
  history::HeldTurn,
};

pub const COOKIE_NAME: &str = "touchline_session";

/// Browsers drop cookies larger than 4 KiB, attributes included.
const MAX_COOKIE_VALUE: usize = 3800;

type HmacSha256 = Hmac<Sha256>;

/// What the cookie carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
  pub id:      SessionId,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub history: Vec<HeldTurn>,
}

impl SessionData {
  pub fn fresh() -> Self { Self { id: SessionId::generate(), history: Vec::new() } }
}

// ─── Signing ─────────────────────────────────────────────────────────────────

/// HMAC key for session cookies.
#[derive(Clone)]
pub struct SessionKey {
  mac: HmacSha256,
}

impl SessionKey {
  pub fn new(secret: &[u8]) -> Result<Self> {
    let mac = HmacSha256::new_from_slice(secret).map_err(|e| Error::Session(e.to_string()))?;
    Ok(Self { mac })
  }

  pub fn sign(&self, data: &SessionData) -> Result<String> {
    let json = serde_json::to_vec(data).map_err(|e| Error::Session(e.to_string()))?;
    let mut mac = self.mac.clone();
    mac.update(&json);
    let tag = mac.finalize().into_bytes();
    Ok(format!("{}.{}", B64.encode(&json), B64.encode(tag)))
  }

  /// `None` unless the value is well-formed and correctly signed.
  pub fn verify(&self, value: &str) -> Option<SessionData> {
    let (payload, tag) = value.split_once('.')?;
    let json = B64.decode(payload).ok()?;
    let tag = B64.decode(tag).ok()?;
    let mut mac = self.mac.clone();
    mac.update(&json);
    mac.verify_slice(&tag).ok()?;
    serde_json::from_slice(&json).ok()
  }

  /// `Set-Cookie` value for `data`. The oldest held turns are dropped until
  /// the cookie fits.
  pub fn set_cookie(&self, data: &SessionData) -> Result<HeaderValue> {
    let mut data = data.clone();
    let mut value = self.sign(&data)?;
    while value.len() > MAX_COOKIE_VALUE && !data.history.is_empty() {
      data.history.remove(0);
      value = self.sign(&data)?;
    }
    HeaderValue::from_str(&format!("{COOKIE_NAME}={value}; HttpOnly; SameSite=Lax; Path=/"))
      .map_err(|e| Error::Session(e.to_string()))
  }
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_cookie() -> HeaderValue {
  HeaderValue::from_static("touchline_session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(k, _)| *k == name)
    .map(|(_, v)| v)
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// The caller's session, verified from the cookie or freshly issued.
#[derive(Debug, Clone)]
pub struct Session {
  pub data:   SessionData,
  /// No valid cookie came with the request.
  pub is_new: bool,
}

impl<St> FromRequestParts<St> for Session
where
  St: Send + Sync,
  Arc<SessionKey>: FromRef<St>,
{
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
    let key = Arc::<SessionKey>::from_ref(state);
    let verified = cookie_value(&parts.headers, COOKIE_NAME).and_then(|v| key.verify(v));
    Ok(match verified {
      Some(data) => Session { data, is_new: false },
      None => {
        let data = SessionData::fresh();
        tracing::debug!(session = %data.id, "starting a new session");
        Session { data, is_new: true }
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use axum::http::Request;
  use touchline_core::conversation::Role;

  use super::*;

  fn key() -> Arc<SessionKey> { Arc::new(SessionKey::new(b"test-secret").unwrap()) }

  async fn extract(cookie: Option<String>, key: Arc<SessionKey>) -> Session {
    let mut req = Request::builder();
    if let Some(c) = cookie {
      req = req.header(header::COOKIE, c);
    }
    let (mut parts, _) = req.body(()).unwrap().into_parts();
    Session::from_request_parts(&mut parts, &key).await.unwrap()
  }

  fn data() -> SessionData {
    SessionData {
      id:      SessionId::from("abc"),
      history: vec![HeldTurn { role: Role::User, content: "Who leads?".into() }],
    }
  }

  #[test]
  fn signed_values_verify() {
    let k = key();
    let value = k.sign(&data()).unwrap();
    assert_eq!(k.verify(&value), Some(data()));
  }

  #[test]
  fn tampered_values_are_rejected() {
    let k = key();
    let value = k.sign(&data()).unwrap();
    let (_, tag) = value.split_once('.').unwrap();

    let forged = SessionData { id: SessionId::from("someone-else"), history: Vec::new() };
    let forged_payload = B64.encode(serde_json::to_vec(&forged).unwrap());
    assert_eq!(k.verify(&format!("{forged_payload}.{tag}")), None);

    let other = SessionKey::new(b"other-secret").unwrap();
    assert_eq!(other.verify(&value), None);
    assert_eq!(k.verify("not-a-cookie"), None);
  }

  #[tokio::test]
  async fn valid_cookie_restores_the_session() {
    let k = key();
    let cookie = format!("theme=dark; {COOKIE_NAME}={}", k.sign(&data()).unwrap());
    let session = extract(Some(cookie), k).await;
    assert!(!session.is_new);
    assert_eq!(session.data, data());
  }

  #[tokio::test]
  async fn bad_signature_starts_a_fresh_session() {
    let value = SessionKey::new(b"other-secret").unwrap().sign(&data()).unwrap();
    let session = extract(Some(format!("{COOKIE_NAME}={value}")), key()).await;
    assert!(session.is_new);
    assert_ne!(session.data.id, SessionId::from("abc"));
    assert!(session.data.history.is_empty());
  }

  #[tokio::test]
  async fn missing_cookie_starts_a_fresh_session() {
    let session = extract(None, key()).await;
    assert!(session.is_new);
  }

  #[test]
  fn oversized_history_is_trimmed_to_fit() {
    let k = key();
    let mut big = data();
    big.history = (0..10)
      .map(|i| HeldTurn { role: Role::Assistant, content: format!("{i}{}", "x".repeat(600)) })
      .collect();

    let header = k.set_cookie(&big).unwrap();
    let header = header.to_str().unwrap();
    assert!(header.starts_with("touchline_session="));
    assert!(header.ends_with("; HttpOnly; SameSite=Lax; Path=/"));

    let value = header
      .trim_start_matches("touchline_session=")
      .split(';')
      .next()
      .unwrap();
    assert!(value.len() <= MAX_COOKIE_VALUE);
    let restored = k.verify(value).unwrap();
    assert!(!restored.history.is_empty() && restored.history.len() < 10);
    assert!(restored.history.last().unwrap().content.starts_with('9'));
  }
}
