//! Offline cache worker for the application shell.
//!
//! This module provides a network-first fetch policy that:
//! - Pre-caches a fixed list of shell resources on install
//! - Garbage-collects buckets left behind by older versions on activate
//! - Serves the cached copy when the network is unavailable

mod http;
mod lifecycle;
mod storage;
mod traits;

pub use http::HttpFetcher;
pub use lifecycle::{OfflineWorker, WorkerState};
pub use storage::{CacheStorage, CachedResponse, MemoryCacheStorage, SqliteCacheStorage};
pub use traits::{CacheResult, CacheSource, Fetcher, Request, Response};
