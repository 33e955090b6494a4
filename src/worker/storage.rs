//! Cache bucket storage trait with SQLite and in-memory implementations.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::traits::{Request, Response};

/// A cached response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  /// The stored response
  pub response: Response,
  /// When the response was cached
  pub cached_at: DateTime<Utc>,
}

/// Trait for named cache buckets of request/response pairs.
pub trait CacheStorage: Send + Sync {
  /// Create the bucket if it doesn't exist yet.
  fn open_bucket(&self, bucket: &str) -> Result<()>;

  /// Names of all buckets, oldest first.
  fn bucket_names(&self) -> Result<Vec<String>>;

  /// Remove a bucket and everything in it. Returns whether it existed.
  fn delete_bucket(&self, bucket: &str) -> Result<bool>;

  /// Store a response for a request, replacing any previous entry.
  fn put(&self, bucket: &str, request: &Request, response: &Response) -> Result<()>;

  /// Store every pair, or none of them if any write fails.
  fn put_all(&self, bucket: &str, entries: &[(&Request, Response)]) -> Result<()>;

  /// Look up the stored response for a request.
  fn match_request(&self, bucket: &str, request: &Request) -> Result<Option<CachedResponse>>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteCacheStorage {
  conn: Mutex<Connection>,
}

impl SqliteCacheStorage {
  /// Open or create the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Named buckets, one per worker version
CREATE TABLE IF NOT EXISTS cache_buckets (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses keyed by request
CREATE TABLE IF NOT EXISTS cache_entries (
    bucket TEXT NOT NULL,
    request_key TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (bucket, request_key)
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_bucket ON cache_entries(bucket);
"#;

impl CacheStorage for SqliteCacheStorage {
  fn open_bucket(&self, bucket: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO cache_buckets (name) VALUES (?)",
        params![bucket],
      )
      .map_err(|e| eyre!("Failed to open cache bucket {}: {}", bucket, e))?;

    Ok(())
  }

  fn bucket_names(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM cache_buckets ORDER BY rowid")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list cache buckets: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache bucket name: {}", e))?;

    Ok(names)
  }

  fn delete_bucket(&self, bucket: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // rolled back on drop if either delete fails
    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute("DELETE FROM cache_entries WHERE bucket = ?", params![bucket])
      .map_err(|e| eyre!("Failed to delete entries of {}: {}", bucket, e))?;

    let removed = tx
      .execute("DELETE FROM cache_buckets WHERE name = ?", params![bucket])
      .map_err(|e| eyre!("Failed to delete cache bucket {}: {}", bucket, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn put(&self, bucket: &str, request: &Request, response: &Response) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    insert_entry(&tx, bucket, request, response)?;
    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn put_all(&self, bucket: &str, entries: &[(&Request, Response)]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .unchecked_transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    for (request, response) in entries {
      insert_entry(&tx, bucket, request, response)?;
    }
    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn match_request(&self, bucket: &str, request: &Request) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(u16, String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT status, headers, body, cached_at FROM cache_entries
         WHERE bucket = ? AND request_key = ?",
        params![bucket, request.cache_key()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up {}: {}", request.url, e))?;

    match row {
      Some((status, headers, body, cached_at_str)) => {
        let headers = serde_json::from_str(&headers)
          .map_err(|e| eyre!("Failed to deserialize headers: {}", e))?;
        Ok(Some(CachedResponse {
          response: Response {
            status,
            headers,
            body,
          },
          cached_at: parse_datetime(&cached_at_str)?,
        }))
      }
      None => Ok(None),
    }
  }
}

/// Insert one entry, creating the bucket if needed.
fn insert_entry(
  conn: &Connection,
  bucket: &str,
  request: &Request,
  response: &Response,
) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

  conn
    .execute(
      "INSERT OR IGNORE INTO cache_buckets (name) VALUES (?)",
      params![bucket],
    )
    .map_err(|e| eyre!("Failed to open cache bucket {}: {}", bucket, e))?;

  conn
    .execute(
      "INSERT OR REPLACE INTO cache_entries (bucket, request_key, method, url, status, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        bucket,
        request.cache_key(),
        request.method,
        request.url.as_str(),
        response.status,
        headers,
        response.body
      ],
    )
    .map_err(|e| eyre!("Failed to store response for {}: {}", request.url, e))?;

  Ok(())
}

#[cfg(test)]
impl SqliteCacheStorage {
  /// Make every insert whose URL matches the SQL LIKE `pattern` fail.
  pub(crate) fn fail_inserts_like(&self, pattern: &str) {
    let conn = self.conn.lock().unwrap();
    conn
      .execute_batch(&format!(
        "CREATE TRIGGER fail_insert BEFORE INSERT ON cache_entries
         WHEN NEW.url LIKE '{}'
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        pattern
      ))
      .unwrap();
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

type Bucket = HashMap<String, CachedResponse>;

/// Cache storage kept in process memory.
#[derive(Default)]
pub struct MemoryCacheStorage {
  buckets: Mutex<Vec<(String, Bucket)>>,
}

impl MemoryCacheStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStorage for MemoryCacheStorage {
  fn open_bucket(&self, bucket: &str) -> Result<()> {
    let mut buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if !buckets.iter().any(|(name, _)| name == bucket) {
      buckets.push((bucket.to_string(), HashMap::new()));
    }
    Ok(())
  }

  fn bucket_names(&self) -> Result<Vec<String>> {
    let buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(buckets.iter().map(|(name, _)| name.clone()).collect())
  }

  fn delete_bucket(&self, bucket: &str) -> Result<bool> {
    let mut buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let before = buckets.len();
    buckets.retain(|(name, _)| name != bucket);
    Ok(buckets.len() != before)
  }

  fn put(&self, bucket: &str, request: &Request, response: &Response) -> Result<()> {
    self.open_bucket(bucket)?;
    let mut buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if let Some((_, entries)) = buckets.iter_mut().find(|(name, _)| name == bucket) {
      entries.insert(
        request.cache_key(),
        CachedResponse {
          response: response.clone(),
          cached_at: Utc::now(),
        },
      );
    }
    Ok(())
  }

  fn put_all(&self, bucket: &str, entries: &[(&Request, Response)]) -> Result<()> {
    self.open_bucket(bucket)?;
    let mut buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if let Some((_, stored)) = buckets.iter_mut().find(|(name, _)| name == bucket) {
      let cached_at = Utc::now();
      for (request, response) in entries {
        stored.insert(
          request.cache_key(),
          CachedResponse {
            response: response.clone(),
            cached_at,
          },
        );
      }
    }
    Ok(())
  }

  fn match_request(&self, bucket: &str, request: &Request) -> Result<Option<CachedResponse>> {
    let buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      buckets
        .iter()
        .find(|(name, _)| name == bucket)
        .and_then(|(_, entries)| entries.get(&request.cache_key()))
        .cloned(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn exercise(storage: &dyn CacheStorage) {
    let index = Request::parse("http://localhost/index.html").unwrap();
    let manifest = Request::parse("http://localhost/manifest.json").unwrap();

    storage.open_bucket("shortlist-v1").unwrap();
    storage.open_bucket("shortlist-v1").unwrap();
    assert_eq!(storage.bucket_names().unwrap(), vec!["shortlist-v1"]);

    let mut response = Response::new(200, "<html></html>");
    response
      .headers
      .push(("content-type".to_string(), "text/html".to_string()));
    storage.put("shortlist-v1", &index, &response).unwrap();

    let hit = storage.match_request("shortlist-v1", &index).unwrap().unwrap();
    assert_eq!(hit.response, response);
    assert!(storage.match_request("shortlist-v1", &manifest).unwrap().is_none());
    assert!(storage.match_request("shortlist-v0", &index).unwrap().is_none());

    // put replaces
    storage
      .put("shortlist-v1", &index, &Response::new(200, "v2"))
      .unwrap();
    let hit = storage.match_request("shortlist-v1", &index).unwrap().unwrap();
    assert_eq!(hit.response.body, b"v2".to_vec());

    // put into an unknown bucket creates it
    storage.put("shortlist-v2", &manifest, &Response::new(200, "{}")).unwrap();
    assert_eq!(
      storage.bucket_names().unwrap(),
      vec!["shortlist-v1", "shortlist-v2"]
    );

    assert!(storage.delete_bucket("shortlist-v1").unwrap());
    assert!(!storage.delete_bucket("shortlist-v1").unwrap());
    assert!(storage.match_request("shortlist-v1", &index).unwrap().is_none());
    assert_eq!(storage.bucket_names().unwrap(), vec!["shortlist-v2"]);
  }

  #[test]
  fn test_sqlite_cache_storage() {
    exercise(&SqliteCacheStorage::open_in_memory().unwrap());
  }

  #[test]
  fn test_memory_cache_storage() {
    exercise(&MemoryCacheStorage::new());
  }

  #[test]
  fn test_sqlite_put_all_is_atomic() {
    let storage = SqliteCacheStorage::open_in_memory().unwrap();
    let root = Request::parse("http://localhost/").unwrap();
    let index = Request::parse("http://localhost/index.html").unwrap();
    let manifest = Request::parse("http://localhost/manifest.json").unwrap();
    storage.put("shortlist-v1", &root, &Response::new(200, "old")).unwrap();
    storage.fail_inserts_like("%manifest.json");

    let entries = vec![
      (&root, Response::new(200, "new")),
      (&index, Response::new(200, "<html>")),
      (&manifest, Response::new(200, "{}")),
    ];
    assert!(storage.put_all("shortlist-v1", &entries).is_err());

    let kept = storage.match_request("shortlist-v1", &root).unwrap().unwrap();
    assert_eq!(kept.response.body, b"old".to_vec());
    assert!(storage.match_request("shortlist-v1", &index).unwrap().is_none());

    // the connection is usable afterwards
    storage.put("shortlist-v1", &index, &Response::new(200, "<html>")).unwrap();
    assert!(storage.match_request("shortlist-v1", &index).unwrap().is_some());
  }

  #[test]
  fn test_memory_put_all() {
    let storage = MemoryCacheStorage::new();
    let root = Request::parse("http://localhost/").unwrap();
    let index = Request::parse("http://localhost/index.html").unwrap();
    let entries = vec![(&root, Response::new(200, "root")), (&index, Response::new(200, "x"))];
    storage.put_all("shortlist-v1", &entries).unwrap();
    assert!(storage.match_request("shortlist-v1", &root).unwrap().is_some());
    assert!(storage.match_request("shortlist-v1", &index).unwrap().is_some());
  }

  #[test]
  fn test_sqlite_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");
    let request = Request::parse("https://example.com/").unwrap();

    SqliteCacheStorage::open(&path)
      .unwrap()
      .put("shortlist-v1", &request, &Response::new(200, "shell"))
      .unwrap();

    let reopened = SqliteCacheStorage::open(&path).unwrap();
    let hit = reopened.match_request("shortlist-v1", &request).unwrap().unwrap();
    assert_eq!(hit.response.body, b"shell".to_vec());
  }
}
