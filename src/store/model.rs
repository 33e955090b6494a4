//! Task data types shared by the collection, the store and the CLI.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single task entry within a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
  pub id: String,
  pub text: String,
  #[serde(default)]
  pub url: String,
  pub completed: bool,
  /// Zero-based position within the owning day, always equal to the index.
  pub order: usize,
}

impl Todo {
  /// Create an open todo with a fresh id at the given position.
  pub fn new(text: impl Into<String>, url: impl Into<String>, order: usize) -> Self {
    Self {
      id: Uuid::new_v4().to_string(),
      text: text.into(),
      url: url.into(),
      completed: false,
      order,
    }
  }
}

/// All tasks scoped to one calendar date (`YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayList {
  pub date: String,
  #[serde(default)]
  pub todos: Vec<Todo>,
}

impl DayList {
  pub fn new(date: impl Into<String>) -> Self {
    Self {
      date: date.into(),
      todos: Vec::new(),
    }
  }

  pub(crate) fn position(&self, id: &str) -> Option<usize> {
    self.todos.iter().position(|t| t.id == id)
  }

  /// Reassign `order` so it matches each todo's index.
  pub(crate) fn renumber(&mut self) {
    for (idx, todo) in self.todos.iter_mut().enumerate() {
      todo.order = idx;
    }
  }

  /// Number of todos not yet completed
  pub fn open_count(&self) -> usize {
    self.todos.iter().filter(|t| !t.completed).count()
  }
}

/// Fields a caller may change on an existing todo.
///
/// `order` can't be set here. Positions only change through delete and move
/// operations, which renumber the whole day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
  pub text: Option<String>,
  pub url: Option<String>,
  pub completed: Option<bool>,
}

impl TodoPatch {
  pub fn is_empty(&self) -> bool {
    self.text.is_none() && self.url.is_none() && self.completed.is_none()
  }

  pub(crate) fn apply(self, todo: &mut Todo) {
    if let Some(text) = self.text {
      todo.text = text;
    }
    if let Some(url) = self.url {
      todo.url = url;
    }
    if let Some(completed) = self.completed {
      todo.completed = completed;
    }
  }
}

/// Direction for moving a todo within its day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Up,
  Down,
}

/// What a mutating operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  /// The collection changed and needs persisting
  Mutated,
  /// The referenced date or todo id does not exist
  NotFound,
  /// The target exists but the request was a no-op (e.g. moving the first item up)
  Unchanged,
}

impl Outcome {
  pub fn is_mutated(self) -> bool {
    matches!(self, Outcome::Mutated)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_new_todo_is_open_with_empty_url() {
    let todo = Todo::new("write report", "", 3);
    assert!(!todo.completed);
    assert_eq!(todo.url, "");
    assert_eq!(todo.order, 3);
    assert!(Uuid::parse_str(&todo.id).is_ok());
  }

  #[test]
  fn test_todo_json_field_names() {
    let todo = Todo {
      id: "abc".to_string(),
      text: "milk".to_string(),
      url: "https://example.com".to_string(),
      completed: true,
      order: 0,
    };
    let value = serde_json::to_value(&todo).unwrap();
    assert_eq!(
      value,
      serde_json::json!({
        "id": "abc",
        "text": "milk",
        "url": "https://example.com",
        "completed": true,
        "order": 0
      })
    );
  }

  #[test]
  fn test_missing_url_defaults_to_empty() {
    let todo: Todo =
      serde_json::from_str(r#"{"id":"a","text":"t","completed":false,"order":0}"#).unwrap();
    assert_eq!(todo.url, "");
  }

  #[test]
  fn test_patch_leaves_unset_fields_alone() {
    let mut todo = Todo::new("a", "u", 0);
    TodoPatch {
      completed: Some(true),
      ..Default::default()
    }
    .apply(&mut todo);
    assert_eq!(todo.text, "a");
    assert_eq!(todo.url, "u");
    assert!(todo.completed);
  }
}
