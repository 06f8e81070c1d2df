//! [`FbrefClient`]: fetches fbref pages and extracts their stat tables.

use std::{sync::Arc, time::Duration};

use reqwest::{
  Client,
  header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue},
};
use touchline_core::{
  competition::CompetitionDirectory,
  record::StatRecord,
  stat::StatCategory,
  store::StatSource,
};

use crate::{
  error::{ExtractionError, Result, SourceError},
  extract::extract,
};

pub const DEFAULT_BASE_URL: &str = "https://fbref.com";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Markers of an interstitial bot-check page. Only consulted when a page has
/// no stat table, since ordinary pages also load the challenge scripts.
const CHALLENGE_MARKERS: &[&str] = &["<title>Just a moment...</title>", "_cf_chl_opt"];

/// Response header set on challenge responses.
const MITIGATED_HEADER: &str = "cf-mitigated";

fn looks_like_challenge(document: &str) -> bool {
  CHALLENGE_MARKERS.iter().any(|m| document.contains(m))
}

/// Connection settings for the source site.
#[derive(Debug, Clone)]
pub struct FbrefConfig {
  pub base_url: String,
  pub timeout:  Duration,
}

impl Default for FbrefConfig {
  fn default() -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_owned(),
      timeout:  Duration::from_secs(30),
    }
  }
}

/// Stat Source Client for fbref.com.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based. Every call
/// to [`FbrefClient::fetch`] performs exactly one request; nothing is cached
/// and nothing is retried.
#[derive(Clone)]
pub struct FbrefClient {
  client:    Client,
  base_url:  String,
  directory: Arc<CompetitionDirectory>,
}

impl FbrefClient {
  pub fn new(config: FbrefConfig, directory: CompetitionDirectory) -> Result<Self> {
    let mut headers = HeaderMap::new();
    headers.insert(
      ACCEPT,
      HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    let client = Client::builder()
      .user_agent(BROWSER_USER_AGENT)
      .default_headers(headers)
      .cookie_store(true)
      .timeout(config.timeout)
      .build()?;

    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_owned(),
      directory: Arc::new(directory),
    })
  }

  pub fn directory(&self) -> &CompetitionDirectory { &self.directory }

  /// Resolve the competition and build the page address.
  pub fn url_for(
    &self,
    category:    StatCategory,
    season:      &str,
    competition: &str,
  ) -> Result<String> {
    let resolved = self
      .directory
      .resolve(competition)
      .ok_or_else(|| SourceError::UnknownCompetition(competition.to_owned()))?;
    let path = category.schema().address(season, &resolved.name, &resolved.id);
    Ok(format!("{}{}", self.base_url, path))
  }

  /// GET `url` and return the body, rejecting error statuses and responses
  /// flagged as challenges.
  pub async fn fetch_document(&self, url: &str) -> Result<String> {
    tracing::debug!(url, "fetching stat page");
    let resp = self.client.get(url).send().await?;

    if resp
      .headers()
      .get(MITIGATED_HEADER)
      .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"challenge"))
    {
      tracing::warn!(url, "stat page answered with a bot challenge");
      return Err(SourceError::Challenge { url: url.to_owned() });
    }

    let status = resp.status();
    if !status.is_success() {
      tracing::warn!(url, status = status.as_u16(), "stat page request failed");
      return Err(SourceError::Fetch { url: url.to_owned(), status: status.as_u16() });
    }

    Ok(resp.text().await?)
  }

  /// Fetch and extract one stat table.
  pub async fn fetch(
    &self,
    category:    StatCategory,
    season:      &str,
    competition: &str,
  ) -> Result<Vec<StatRecord>> {
    let url      = self.url_for(category, season, competition)?;
    let document = self.fetch_document(&url).await?;
    let records  = match extract(&document, category.schema(), season, competition) {
      Err(ExtractionError::ContainerNotFound) if looks_like_challenge(&document) => {
        tracing::warn!(url = %url, "stat page answered with a bot challenge");
        return Err(SourceError::Challenge { url });
      }
      other => other?,
    };
    tracing::info!(%category, season, competition, rows = records.len(), "extracted stat table");
    Ok(records)
  }
}

impl StatSource for FbrefClient {
  type Error = SourceError;

  async fn fetch(
    &self,
    category:    StatCategory,
    season:      &str,
    competition: &str,
  ) -> Result<Vec<StatRecord>> {
    FbrefClient::fetch(self, category, season, competition).await
  }
}
