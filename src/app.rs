use chrono::{Local, NaiveDate};
use color_eyre::{eyre::eyre, Result};
use tracing::info;

use shortlist::config::Config;
use shortlist::db::Database;
use shortlist::store::{DayList, Outcome, SlotStorage, SqliteSlotStorage, TaskStore, TodoPatch};
use shortlist::worker::{
  CacheSource, CacheStorage, HttpFetcher, OfflineWorker, Request, SqliteCacheStorage, WorkerState,
};

use crate::{Command, WorkerCommand};

/// Number of id characters shown in listings
const SHORT_ID: usize = 8;

/// Runs one CLI command against the configured stores
pub struct App {
  config: Config,
}

impl App {
  pub fn new(config: Config) -> Self {
    Self { config }
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    match command {
      Command::Worker { action } => self.run_worker(action).await,
      command => {
        let db = Database::open(&self.config.database_path()?)?;
        let mut store = TaskStore::load(SqliteSlotStorage::new(db));
        run_store(&mut store, command)
      }
    }
  }

  fn worker(&self) -> Result<OfflineWorker<SqliteCacheStorage, HttpFetcher>> {
    let storage = SqliteCacheStorage::open(&self.config.cache_path()?)?;
    Ok(OfflineWorker::new(
      storage,
      HttpFetcher::new()?,
      self.config.worker.cache_name.clone(),
      self.config.worker.shell_urls()?,
    ))
  }

  async fn run_worker(&self, action: WorkerCommand) -> Result<()> {
    let mut worker = self.worker()?;

    match action {
      WorkerCommand::Install => {
        let state = worker.start().await;
        match state {
          WorkerState::Active => println!("Installed and activated {}", worker.cache_name()),
          _ => println!(
            "Installed {} but caching the shell failed; run `shortlist worker activate` to take over",
            worker.cache_name()
          ),
        }
      }
      WorkerCommand::Activate => {
        worker.activate();
        println!("Activated {}", worker.cache_name());
      }
      WorkerCommand::Fetch { url } => {
        let request = Request::parse(&url)?;

        // An installed version resumes from its bucket; otherwise install first
        let installed = worker
          .storage()
          .bucket_names()?
          .iter()
          .any(|name| name == worker.cache_name());
        if installed {
          worker.activate();
        } else {
          worker.start().await;
        }

        let result = worker.fetch(&request).await;
        info!(url = %request.url, source = ?result.source, "Fetched");
        match (result.source, result.data) {
          (CacheSource::Passthrough, _) => println!("Not intercepted: {}", request.url),
          (CacheSource::Miss, _) | (_, None) => {
            return Err(eyre!("Offline and {} is not cached", request.url))
          }
          (source, Some(response)) => {
            let from = match source {
              CacheSource::Network => "network".to_string(),
              _ => match result.cached_at {
                Some(at) => format!("cache, stored {}", at.format("%Y-%m-%d %H:%M:%S")),
                None => "cache".to_string(),
              },
            };
            println!("{} {} ({} bytes, {})", response.status, request.url, response.body.len(), from);
          }
        }
      }
      WorkerCommand::Buckets => {
        for name in worker.storage().bucket_names()? {
          let marker = if name == worker.cache_name() { "*" } else { " " };
          println!("{} {}", marker, name);
        }
      }
    }

    Ok(())
  }
}

fn today() -> NaiveDate {
  Local::now().date_naive()
}

fn date_key(date: NaiveDate) -> String {
  date.format("%Y-%m-%d").to_string()
}

fn day_or_today(date: Option<NaiveDate>) -> String {
  date_key(date.unwrap_or_else(today))
}

fn run_store<S: SlotStorage>(store: &mut TaskStore<S>, command: Command) -> Result<()> {
  match command {
    Command::List => {
      let days = store.sorted_day_lists();
      if days.is_empty() {
        println!("No todos yet. Add one with `shortlist add <text>`.");
      }
      for day in days {
        print!("{}", render_day(day));
      }
    }
    Command::Add { text, date } => {
      let date = day_or_today(date);
      let todo = store.create_todo(&date, &text)?;
      println!("Added {} to {}", short_id(&todo.id), date);
    }
    Command::Update {
      id,
      date,
      text,
      url,
      completed,
    } => {
      let date = day_or_today(date);
      let patch = TodoPatch {
        text,
        url,
        completed,
      };
      if patch.is_empty() {
        return Err(eyre!("Nothing to update: pass --text, --url or --completed"));
      }
      let id = resolve_id(store, &date, &id)?;
      let outcome = store.update_todo(&date, &id, patch)?;
      report(outcome, &date, &id, "Updated")?;
    }
    Command::Done { id, date } => {
      let date = day_or_today(date);
      let id = resolve_id(store, &date, &id)?;
      let patch = TodoPatch {
        completed: Some(true),
        ..Default::default()
      };
      let outcome = store.update_todo(&date, &id, patch)?;
      report(outcome, &date, &id, "Completed")?;
    }
    Command::Delete { id, date } => {
      let date = day_or_today(date);
      let id = resolve_id(store, &date, &id)?;
      let outcome = store.delete_todo(&date, &id)?;
      report(outcome, &date, &id, "Deleted")?;
    }
    Command::Move {
      id,
      direction,
      date,
    } => {
      let date = day_or_today(date);
      let id = resolve_id(store, &date, &id)?;
      let outcome = store.move_within_day(&date, &id, direction.into())?;
      report(outcome, &date, &id, "Moved")?;
    }
    Command::MoveTo {
      id,
      from,
      to,
      index,
    } => {
      let (from, to) = (date_key(from), date_key(to));
      let id = resolve_id(store, &from, &id)?;
      let outcome = store.move_to_day(&from, &to, &id, index)?;
      report(outcome, &from, &id, &format!("Moved to {}:", to))?;
    }
    Command::Carry { from, to } => {
      let (from, to) = (date_key(from), day_or_today(to));
      let before = store.day_list(&to).map_or(0, |d| d.todos.len());
      match store.copy_open_todos(&from, &to)? {
        Outcome::NotFound => return Err(eyre!("No list for {}", from)),
        _ => {
          let after = store.day_list(&to).map_or(0, |d| d.todos.len());
          println!("Carried {} open todos from {} to {}", after - before, from, to);
        }
      }
    }
    Command::Worker { .. } => return Err(eyre!("Worker commands don't use the task store")),
  }

  Ok(())
}

fn short_id(id: &str) -> &str {
  id.get(..SHORT_ID).unwrap_or(id)
}

/// Expand a unique id prefix within `date` to the full id.
///
/// Unknown prefixes are returned unchanged so the store reports them as not
/// found.
fn resolve_id<S: SlotStorage>(store: &TaskStore<S>, date: &str, prefix: &str) -> Result<String> {
  let Some(day) = store.day_list(date) else {
    return Ok(prefix.to_string());
  };

  let matches: Vec<&str> = day
    .todos
    .iter()
    .map(|t| t.id.as_str())
    .filter(|id| id.starts_with(prefix))
    .collect();

  match matches.as_slice() {
    [id] => Ok(id.to_string()),
    [] => Ok(prefix.to_string()),
    _ => Err(eyre!("Id prefix {} matches {} todos on {}", prefix, matches.len(), date)),
  }
}

fn report(outcome: Outcome, date: &str, id: &str, action: &str) -> Result<()> {
  match outcome {
    Outcome::Mutated => {
      println!("{} {}", action, short_id(id));
      Ok(())
    }
    Outcome::Unchanged => {
      println!("{} is already at the edge of {}", short_id(id), date);
      Ok(())
    }
    Outcome::NotFound => Err(eyre!("No todo {} on {}", id, date)),
  }
}

fn render_day(day: &DayList) -> String {
  let mut out = format!(
    "{} ({}/{} open)\n",
    day.date,
    day.open_count(),
    day.todos.len()
  );
  for todo in &day.todos {
    let check = if todo.completed { "x" } else { " " };
    out.push_str(&format!(
      "  {:>2}. [{}] {}  {}",
      todo.order + 1,
      check,
      todo.text,
      short_id(&todo.id)
    ));
    if !todo.url.is_empty() {
      out.push_str(&format!("  <{}>", todo.url));
    }
    out.push('\n');
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use shortlist::store::{MemoryStorage, Todo};

  fn store_with(date: &str, texts: &[&str]) -> (TaskStore<MemoryStorage>, Vec<Todo>) {
    let mut store = TaskStore::load(MemoryStorage::new());
    let todos = texts
      .iter()
      .map(|text| store.create_todo(date, text).unwrap())
      .collect();
    (store, todos)
  }

  #[test]
  fn test_resolve_unique_prefix() {
    let (store, todos) = store_with("2024-01-01", &["a", "b"]);
    let full = &todos[1].id;
    assert_eq!(resolve_id(&store, "2024-01-01", full).unwrap(), *full);
    assert_eq!(resolve_id(&store, "2024-01-01", "zzz").unwrap(), "zzz");
    assert_eq!(resolve_id(&store, "2030-01-01", "abc").unwrap(), "abc");
  }

  #[test]
  fn test_resolve_ambiguous_prefix() {
    let (store, _) = store_with("2024-01-01", &["a", "b"]);
    assert!(resolve_id(&store, "2024-01-01", "").is_err());
  }

  #[test]
  fn test_render_day() {
    let day = DayList {
      date: "2024-01-01".to_string(),
      todos: vec![
        Todo {
          id: "0123456789abcdef".to_string(),
          text: "buy milk".to_string(),
          url: String::new(),
          completed: true,
          order: 0,
        },
        Todo {
          id: "fedcba9876543210".to_string(),
          text: "read".to_string(),
          url: "https://example.com".to_string(),
          completed: false,
          order: 1,
        },
      ],
    };
    assert_eq!(
      render_day(&day),
      "2024-01-01 (1/2 open)\n   1. [x] buy milk  01234567\n   2. [ ] read  fedcba98  <https://example.com>\n"
    );
  }

  #[test]
  fn test_carry_command_copies_open_todos() {
    let (mut store, todos) = store_with("2024-01-01", &["a", "b"]);
    run_store(
      &mut store,
      Command::Done {
        id: todos[0].id.clone(),
        date: NaiveDate::from_ymd_opt(2024, 1, 1),
      },
    )
    .unwrap();
    run_store(
      &mut store,
      Command::Carry {
        from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        to: NaiveDate::from_ymd_opt(2024, 1, 2),
      },
    )
    .unwrap();

    let carried = store.day_list("2024-01-02").unwrap();
    assert_eq!(carried.todos.len(), 1);
    assert_eq!(carried.todos[0].text, "b");
  }

  #[test]
  fn test_missing_todo_is_error() {
    let (mut store, _) = store_with("2024-01-01", &["a"]);
    let result = run_store(
      &mut store,
      Command::Delete {
        id: "missing".to_string(),
        date: NaiveDate::from_ymd_opt(2024, 1, 1),
      },
    );
    assert!(result.is_err());
  }

  #[test]
  fn test_carry_from_missing_day_is_error() {
    let mut store = TaskStore::load(MemoryStorage::new());
    let result = run_store(
      &mut store,
      Command::Carry {
        from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        to: NaiveDate::from_ymd_opt(2024, 1, 2),
      },
    );
    assert!(result.is_err());
    assert!(store.day_list("2024-01-02").is_none());
  }
}
