//! Key-value slot storage that the task store persists into.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::db::Database;

/// Slot holding the serialized day lists.
pub const STORAGE_KEY: &str = "shortlist-data";

/// Trait for slot storage backends.
pub trait SlotStorage: Send + Sync {
  /// Read the value stored under `key`, if any.
  fn get_item(&self, key: &str) -> Result<Option<String>>;

  /// Replace the value stored under `key`.
  fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// SQLite-backed slot storage.
pub struct SqliteSlotStorage {
  db: Mutex<Database>,
}

impl SqliteSlotStorage {
  pub fn new(db: Database) -> Self {
    Self { db: Mutex::new(db) }
  }

  pub fn open_in_memory() -> Result<Self> {
    Ok(Self::new(Database::open_in_memory()?))
  }
}

impl SlotStorage for SqliteSlotStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let db = self.db.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    db.conn()
      .query_row(
        "SELECT value FROM slots WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read slot {}: {}", key, e))
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let db = self.db.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    db.conn()
      .execute(
        "INSERT OR REPLACE INTO slots (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write slot {}: {}", key, e))?;

    Ok(())
  }
}

/// Storage that keeps slots in process memory.
#[derive(Default)]
pub struct MemoryStorage {
  slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seed a slot, e.g. with data written by an earlier session.
  pub fn with_item(self, key: &str, value: &str) -> Self {
    if let Ok(mut slots) = self.slots.lock() {
      slots.insert(key.to_string(), value.to_string());
    }
    self
  }
}

impl SlotStorage for MemoryStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let slots = self.slots.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(slots.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let mut slots = self.slots.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    slots.insert(key.to_string(), value.to_string());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sqlite_slot_missing_then_set() {
    let storage = SqliteSlotStorage::open_in_memory().unwrap();
    assert_eq!(storage.get_item(STORAGE_KEY).unwrap(), None);

    storage.set_item(STORAGE_KEY, "[]").unwrap();
    storage.set_item(STORAGE_KEY, r#"[{"date":"2024-01-01","todos":[]}]"#).unwrap();
    assert_eq!(
      storage.get_item(STORAGE_KEY).unwrap().as_deref(),
      Some(r#"[{"date":"2024-01-01","todos":[]}]"#)
    );
  }

  #[test]
  fn test_sqlite_slot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("shortlist.db");

    SqliteSlotStorage::new(Database::open(&path).unwrap())
      .set_item("k", "v")
      .unwrap();

    let reopened = SqliteSlotStorage::new(Database::open(&path).unwrap());
    assert_eq!(reopened.get_item("k").unwrap().as_deref(), Some("v"));
  }

  #[test]
  fn test_memory_storage() {
    let storage = MemoryStorage::new().with_item("a", "1");
    assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("1"));
    storage.set_item("a", "2").unwrap();
    assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("2"));
    assert_eq!(storage.get_item("b").unwrap(), None);
  }
}
