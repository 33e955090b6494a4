//! Task store: the day-list collection plus its persistence slot.

use color_eyre::Result;
use tracing::{debug, error, info};

use super::collection::DayLists;
use super::model::{DayList, Direction, Outcome, Todo, TodoPatch};
use super::storage::{SlotStorage, STORAGE_KEY};

/// Owns the day lists and writes a full snapshot after every mutation.
///
/// Construct one with [`TaskStore::load`] and pass it to whatever needs it.
pub struct TaskStore<S: SlotStorage> {
  lists: DayLists,
  storage: S,
}

impl<S: SlotStorage> TaskStore<S> {
  /// Load the collection from `storage`.
  ///
  /// An absent slot starts empty. A slot that can't be read or parsed is
  /// logged and discarded; the store starts empty rather than failing.
  pub fn load(storage: S) -> Self {
    let lists = match storage.get_item(STORAGE_KEY) {
      Ok(Some(json)) => match DayLists::from_json(&json) {
        Ok(lists) => {
          info!(days = lists.len(), "Loaded day lists");
          lists
        }
        Err(e) => {
          error!(error = %e, "Failed to load stored day lists, starting empty");
          DayLists::new()
        }
      },
      Ok(None) => {
        debug!("No stored day lists");
        DayLists::new()
      }
      Err(e) => {
        error!(error = %e, "Failed to read day list storage, starting empty");
        DayLists::new()
      }
    };

    Self { lists, storage }
  }

  /// Write the whole collection to the storage slot.
  pub fn persist(&self) -> Result<()> {
    let json = self.lists.to_json()?;
    self.storage.set_item(STORAGE_KEY, &json)?;
    debug!(days = self.lists.len(), bytes = json.len(), "Persisted day lists");
    Ok(())
  }

  fn persist_if(&self, outcome: Outcome) -> Result<Outcome> {
    if outcome.is_mutated() {
      self.persist()?;
    }
    Ok(outcome)
  }

  /// Ascending-by-date view for display.
  pub fn sorted_day_lists(&self) -> Vec<&DayList> {
    self.lists.sorted()
  }

  /// Look up a day without creating it.
  pub fn day_list(&self, date: &str) -> Option<&DayList> {
    self.lists.get(date)
  }

  pub fn lists(&self) -> &DayLists {
    &self.lists
  }

  pub fn get_or_create_day_list(&mut self, date: &str) -> Result<&DayList> {
    let (_, created) = self.lists.get_or_create(date);
    if created {
      info!(date, "Created day list");
      self.persist()?;
    }
    let (day, _) = self.lists.get_or_create(date);
    Ok(day)
  }

  pub fn create_todo(&mut self, date: &str, text: &str) -> Result<Todo> {
    let todo = self.lists.create_todo(date, text);
    debug!(date, id = %todo.id, "Created todo");
    self.persist()?;
    Ok(todo)
  }

  pub fn update_todo(&mut self, date: &str, id: &str, patch: TodoPatch) -> Result<Outcome> {
    let outcome = self.lists.update_todo(date, id, patch);
    debug!(date, id, ?outcome, "Update todo");
    self.persist_if(outcome)
  }

  pub fn delete_todo(&mut self, date: &str, id: &str) -> Result<Outcome> {
    let outcome = self.lists.delete_todo(date, id);
    debug!(date, id, ?outcome, "Delete todo");
    self.persist_if(outcome)
  }

  pub fn move_within_day(&mut self, date: &str, id: &str, direction: Direction) -> Result<Outcome> {
    let outcome = self.lists.move_within_day(date, id, direction);
    debug!(date, id, ?direction, ?outcome, "Move todo within day");
    self.persist_if(outcome)
  }

  pub fn move_to_day(
    &mut self,
    from_date: &str,
    to_date: &str,
    id: &str,
    to_index: usize,
  ) -> Result<Outcome> {
    let outcome = self.lists.move_to_day(from_date, to_date, id, to_index);
    debug!(from_date, to_date, id, to_index, ?outcome, "Move todo to day");
    self.persist_if(outcome)
  }

  pub fn copy_open_todos(&mut self, from_date: &str, to_date: &str) -> Result<Outcome> {
    let outcome = self.lists.copy_open_todos(from_date, to_date);
    debug!(from_date, to_date, ?outcome, "Copy open todos");
    self.persist_if(outcome)
  }
}
