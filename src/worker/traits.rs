//! Core traits and types for the offline cache worker.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// An outgoing request the worker may intercept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub method: String,
  pub url: Url,
}

impl Request {
  pub fn get(url: Url) -> Self {
    Self {
      method: "GET".to_string(),
      url,
    }
  }

  pub fn parse(url: &str) -> Result<Self> {
    let url = Url::parse(url).map_err(|e| eyre!("Invalid request URL {}: {}", url, e))?;
    Ok(Self::get(url))
  }

  /// Whether the worker handles this request at all (http/https only).
  pub fn is_http(&self) -> bool {
    matches!(self.url.scheme(), "http" | "https")
  }

  /// Stable key identifying this request inside a cache bucket.
  pub fn cache_key(&self) -> String {
    let input = format!("{} {}", self.method.to_uppercase(), self.url);

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A response payload. Cloning it is how one copy goes to the cache and
/// the other to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  /// 2xx status
  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Network access used by the worker.
///
/// `Err` means the network itself failed. An HTTP error status is still an
/// `Ok` response.
pub trait Fetcher: Send + Sync {
  fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response>>;
}

/// Result from an intercepted fetch, including where the response came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from live network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at: Some(cached_at),
    }
  }
}

impl CacheResult<Option<Response>> {
  /// The worker did not intercept the request.
  pub fn passthrough() -> Self {
    Self {
      data: None,
      source: CacheSource::Passthrough,
      cached_at: None,
    }
  }

  /// Network failed and nothing was cached for the request.
  pub fn miss() -> Self {
    Self {
      data: None,
      source: CacheSource::Miss,
      cached_at: None,
    }
  }
}

/// Indicates where a fetch result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Live data from the network
  Network,
  /// Network unavailable, serving the cached copy
  Offline,
  /// Network unavailable and no cached copy exists
  Miss,
  /// Not intercepted: non-http scheme, or the worker is not active
  Passthrough,
}
