//! Day-keyed todo lists persisted to a key-value slot.
//!
//! - [`DayLists`] holds the collection and every mutation, storage-free
//! - [`TaskStore`] wraps it and persists a full snapshot after each change
//! - [`SlotStorage`] is the persistence seam (SQLite on disk, memory in tests)

mod collection;
mod model;
mod storage;
mod task_store;

pub use collection::DayLists;
pub use model::{DayList, Direction, Outcome, Todo, TodoPatch};
pub use storage::{MemoryStorage, SlotStorage, SqliteSlotStorage, STORAGE_KEY};
pub use task_store::TaskStore;
