//! In-memory collection of day lists and the mutations on it.
//!
//! Nothing here touches storage; [`super::TaskStore`] wraps these operations
//! and persists after each one that reports [`Outcome::Mutated`].

use color_eyre::{eyre::eyre, Result};

use super::model::{DayList, Direction, Outcome, Todo, TodoPatch};

/// Day-keyed todo lists, at most one per date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayLists {
  days: Vec<DayList>,
}

impl DayLists {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build from persisted lists. Stored order is kept as-is.
  pub fn from_days(days: Vec<DayList>) -> Self {
    Self { days }
  }

  /// Decode the persisted JSON form: an array of day lists.
  pub fn from_json(json: &str) -> Result<Self> {
    let days: Vec<DayList> =
      serde_json::from_str(json).map_err(|e| eyre!("Failed to parse day lists: {}", e))?;
    Ok(Self { days })
  }

  pub fn to_json(&self) -> Result<String> {
    serde_json::to_string(&self.days).map_err(|e| eyre!("Failed to serialize day lists: {}", e))
  }

  pub fn len(&self) -> usize {
    self.days.len()
  }

  pub fn is_empty(&self) -> bool {
    self.days.is_empty()
  }

  /// Day lists in storage order.
  pub fn days(&self) -> &[DayList] {
    &self.days
  }

  /// Ascending-by-date view, recomputed on every call.
  ///
  /// Dates compare as strings, which only sorts correctly for fixed-width
  /// `YYYY-MM-DD` values.
  pub fn sorted(&self) -> Vec<&DayList> {
    let mut sorted: Vec<&DayList> = self.days.iter().collect();
    sorted.sort_by(|a, b| a.date.cmp(&b.date));
    sorted
  }

  pub fn get(&self, date: &str) -> Option<&DayList> {
    self.days.iter().find(|d| d.date == date)
  }

  fn index_of(&self, date: &str) -> Option<usize> {
    self.days.iter().position(|d| d.date == date)
  }

  /// Index of the day for `date`, creating it if needed.
  ///
  /// Returns `(index, created)`. Creating a day re-sorts the collection.
  fn ensure_day(&mut self, date: &str) -> (usize, bool) {
    if let Some(idx) = self.index_of(date) {
      return (idx, false);
    }
    self.days.push(DayList::new(date));
    self.days.sort_by(|a, b| a.date.cmp(&b.date));
    let idx = self.index_of(date).unwrap_or(self.days.len() - 1);
    (idx, true)
  }

  /// Return the day for `date`, creating an empty one when absent.
  ///
  /// The flag is `true` when the day was created by this call.
  pub fn get_or_create(&mut self, date: &str) -> (&DayList, bool) {
    let (idx, created) = self.ensure_day(date);
    (&self.days[idx], created)
  }

  /// Append a new open todo to `date`, creating the day if needed.
  pub fn create_todo(&mut self, date: &str, text: &str) -> Todo {
    let (idx, _) = self.ensure_day(date);
    let day = &mut self.days[idx];
    let todo = Todo::new(text, "", day.todos.len());
    day.todos.push(todo.clone());
    todo
  }

  pub fn update_todo(&mut self, date: &str, id: &str, patch: TodoPatch) -> Outcome {
    let Some(day) = self.days.iter_mut().find(|d| d.date == date) else {
      return Outcome::NotFound;
    };
    let Some(todo) = day.todos.iter_mut().find(|t| t.id == id) else {
      return Outcome::NotFound;
    };
    patch.apply(todo);
    Outcome::Mutated
  }

  pub fn delete_todo(&mut self, date: &str, id: &str) -> Outcome {
    let Some(day) = self.days.iter_mut().find(|d| d.date == date) else {
      return Outcome::NotFound;
    };
    let Some(idx) = day.position(id) else {
      return Outcome::NotFound;
    };
    day.todos.remove(idx);
    day.renumber();
    Outcome::Mutated
  }

  /// Swap a todo with its neighbour. Moving past either end is `Unchanged`.
  pub fn move_within_day(&mut self, date: &str, id: &str, direction: Direction) -> Outcome {
    let Some(day) = self.days.iter_mut().find(|d| d.date == date) else {
      return Outcome::NotFound;
    };
    let Some(idx) = day.position(id) else {
      return Outcome::NotFound;
    };

    let target = match direction {
      Direction::Up => idx.checked_sub(1),
      Direction::Down => Some(idx + 1).filter(|&i| i < day.todos.len()),
    };
    let Some(target) = target else {
      return Outcome::Unchanged;
    };

    day.todos.swap(idx, target);
    day.renumber();
    Outcome::Mutated
  }

  /// Move a todo to `to_index` in another (or the same) day.
  ///
  /// The todo is removed first, so for same-day moves `to_index` refers to
  /// the list without it. Indices past the end append.
  pub fn move_to_day(
    &mut self,
    from_date: &str,
    to_date: &str,
    id: &str,
    to_index: usize,
  ) -> Outcome {
    let Some(from_idx) = self.index_of(from_date) else {
      return Outcome::NotFound;
    };
    let from_day = &mut self.days[from_idx];
    let Some(pos) = from_day.position(id) else {
      return Outcome::NotFound;
    };
    let todo = from_day.todos.remove(pos);
    from_day.renumber();

    let (to_idx, _) = self.ensure_day(to_date);
    let to_day = &mut self.days[to_idx];
    let at = to_index.min(to_day.todos.len());
    to_day.todos.insert(at, todo);
    to_day.renumber();
    Outcome::Mutated
  }

  /// Copy every open todo from `from_date` onto the end of `to_date`.
  ///
  /// A missing source day is `NotFound` and leaves the destination
  /// uncreated. An existing source with nothing open still creates the
  /// destination day.
  pub fn copy_open_todos(&mut self, from_date: &str, to_date: &str) -> Outcome {
    let Some(from_idx) = self.index_of(from_date) else {
      return Outcome::NotFound;
    };
    let open: Vec<(String, String)> = self.days[from_idx]
      .todos
      .iter()
      .filter(|t| !t.completed)
      .map(|t| (t.text.clone(), t.url.clone()))
      .collect();

    let (to_idx, _) = self.ensure_day(to_date);
    let to_day = &mut self.days[to_idx];
    for (text, url) in open {
      let order = to_day.todos.len();
      to_day.todos.push(Todo::new(text, url, order));
    }
    Outcome::Mutated
  }
}
