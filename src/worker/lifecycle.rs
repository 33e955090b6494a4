//! Offline worker: install, activate and network-first fetch over a cache bucket.

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use tracing::{debug, error, info, warn};
use url::Url;

use super::storage::CacheStorage;
use super::traits::{CacheResult, Fetcher, Request, Response};

/// Lifecycle of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  /// Populating the cache bucket with the shell resources
  Installing,
  /// Installed and waiting to take over
  Installed,
  /// Controls clients and intercepts their fetches
  Active,
  /// Replaced by a newer version; no longer intercepts anything
  Redundant,
}

/// Keeps the application shell available offline.
///
/// One bucket, named after the worker version, holds the shell resources
/// and every response fetched while active. A new bucket name means a new
/// version; activating it removes all other buckets.
pub struct OfflineWorker<S: CacheStorage, F: Fetcher> {
  storage: S,
  fetcher: F,
  cache_name: String,
  shell: Vec<Request>,
  state: WorkerState,
  skip_waiting: bool,
  controls_clients: bool,
}

impl<S: CacheStorage, F: Fetcher> OfflineWorker<S, F> {
  pub fn new(storage: S, fetcher: F, cache_name: impl Into<String>, shell: Vec<Url>) -> Self {
    Self {
      storage,
      fetcher,
      cache_name: cache_name.into(),
      shell: shell.into_iter().map(Request::get).collect(),
      state: WorkerState::Installing,
      skip_waiting: false,
      controls_clients: false,
    }
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn cache_name(&self) -> &str {
    &self.cache_name
  }

  /// Whether install finished populating the cache and asked to activate
  /// without waiting.
  pub fn skips_waiting(&self) -> bool {
    self.skip_waiting
  }

  pub fn controls_clients(&self) -> bool {
    self.controls_clients
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Install, then activate straight away if install asked to skip waiting.
  pub async fn start(&mut self) -> WorkerState {
    self.install().await;
    if self.skip_waiting {
      self.activate();
    }
    self.state
  }

  /// Open the bucket and cache the shell resources.
  ///
  /// A failure is logged and the worker still ends up installed, but it
  /// then waits instead of activating immediately.
  pub async fn install(&mut self) {
    self.state = WorkerState::Installing;
    self.skip_waiting = false;
    info!(cache = %self.cache_name, resources = self.shell.len(), "Installing offline worker");

    match self.add_all().await {
      Ok(()) => {
        self.skip_waiting = true;
        info!(cache = %self.cache_name, "Cached shell resources");
      }
      Err(e) => {
        error!(cache = %self.cache_name, error = %e, "Failed to cache");
      }
    }

    self.state = WorkerState::Installed;
  }

  /// Fetch every shell resource and store them all, or none.
  async fn add_all(&self) -> Result<()> {
    self.storage.open_bucket(&self.cache_name)?;

    let responses = try_join_all(self.shell.iter().map(|request| async move {
      let response = self.fetcher.fetch(request).await?;
      if !response.ok() {
        return Err(eyre!(
          "Request for {} returned status {}",
          request.url,
          response.status
        ));
      }
      Ok::<_, color_eyre::Report>((request, response))
    }))
    .await?;

    self.storage.put_all(&self.cache_name, &responses)
  }

  /// Delete stale buckets and take control of clients.
  pub fn activate(&mut self) {
    info!(cache = %self.cache_name, "Activating offline worker");

    let names = match self.storage.bucket_names() {
      Ok(names) => names,
      Err(e) => {
        error!(error = %e, "Failed to list cache buckets");
        Vec::new()
      }
    };

    for name in names.iter().filter(|name| **name != self.cache_name) {
      match self.storage.delete_bucket(name) {
        Ok(_) => info!(cache = %name, "Deleted stale cache bucket"),
        Err(e) => error!(cache = %name, error = %e, "Failed to delete cache bucket"),
      }
    }

    self.controls_clients = true;
    self.state = WorkerState::Active;
  }

  /// Retire this version after a newer one (another bucket name) took over.
  pub fn supersede(&mut self, by: &str) {
    info!(cache = %self.cache_name, by, "Offline worker superseded");
    self.controls_clients = false;
    self.skip_waiting = false;
    self.state = WorkerState::Redundant;
  }

  /// Network first, falling back to the cache.
  ///
  /// Requests are passed through untouched when they aren't http(s) or the
  /// worker isn't active yet.
  pub async fn fetch(&self, request: &Request) -> CacheResult<Option<Response>> {
    if !request.is_http() || self.state != WorkerState::Active {
      debug!(url = %request.url, state = ?self.state, "Not intercepting request");
      return CacheResult::passthrough();
    }

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        let to_cache = response.clone();
        self.cache_response(request, &to_cache);
        CacheResult::from_network(Some(response))
      }
      Err(e) => {
        warn!(url = %request.url, error = %e, "Network unavailable, trying cache");
        match self.storage.match_request(&self.cache_name, request) {
          Ok(Some(cached)) => CacheResult::offline(Some(cached.response), cached.cached_at),
          Ok(None) => {
            debug!(url = %request.url, "No cached response");
            CacheResult::miss()
          }
          Err(e) => {
            error!(url = %request.url, error = %e, "Failed to read cache");
            CacheResult::miss()
          }
        }
      }
    }
  }

  fn cache_response(&self, request: &Request, response: &Response) {
    // only GET responses can be stored
    if !request.method.eq_ignore_ascii_case("GET") {
      debug!(url = %request.url, method = %request.method, "Skipping cache for non-GET request");
      return;
    }
    if let Err(e) = self.storage.put(&self.cache_name, request, response) {
      error!(url = %request.url, error = %e, "Failed to cache response");
    }
  }
}
