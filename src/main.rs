mod app;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use std::path::PathBuf;

use shortlist::config;
use shortlist::logging;
use shortlist::store::Direction;

#[derive(Parser, Debug)]
#[command(name = "shortlist")]
#[command(about = "Short per-day task lists")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/shortlist/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Show every day and its todos
  List,
  /// Add a todo
  Add {
    text: String,
    /// Day to add to (default: today)
    #[arg(short, long)]
    date: Option<NaiveDate>,
  },
  /// Change a todo's text, link or completion
  Update {
    /// Todo id or a unique prefix of it
    id: String,
    #[arg(short, long)]
    date: Option<NaiveDate>,
    #[arg(long)]
    text: Option<String>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    completed: Option<bool>,
  },
  /// Mark a todo as completed
  Done {
    id: String,
    #[arg(short, long)]
    date: Option<NaiveDate>,
  },
  /// Remove a todo
  Delete {
    id: String,
    #[arg(short, long)]
    date: Option<NaiveDate>,
  },
  /// Move a todo one place up or down within its day
  Move {
    id: String,
    direction: MoveDirection,
    #[arg(short, long)]
    date: Option<NaiveDate>,
  },
  /// Move a todo to another day
  MoveTo {
    id: String,
    #[arg(long)]
    from: NaiveDate,
    #[arg(long)]
    to: NaiveDate,
    /// Position in the target day (past the end appends)
    #[arg(long, default_value_t = 0)]
    index: usize,
  },
  /// Copy the open todos of one day onto another
  Carry {
    #[arg(long)]
    from: NaiveDate,
    /// Target day (default: today)
    #[arg(long)]
    to: Option<NaiveDate>,
  },
  /// Manage the offline cache
  Worker {
    #[command(subcommand)]
    action: WorkerCommand,
  },
}

#[derive(Subcommand, Debug)]
pub enum WorkerCommand {
  /// Cache the shell resources and activate
  Install,
  /// Activate the current version, removing stale caches
  Activate,
  /// Fetch a URL network-first, falling back to the cache
  Fetch { url: String },
  /// List cache buckets
  Buckets,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MoveDirection {
  Up,
  Down,
}

impl From<MoveDirection> for Direction {
  fn from(direction: MoveDirection) -> Self {
    match direction {
      MoveDirection::Up => Direction::Up,
      MoveDirection::Down => Direction::Down,
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let _guard = logging::init(&config.data_dir()?, &config.log_level)?;

  let app = app::App::new(config);
  app.run(args.command.unwrap_or(Command::List)).await?;

  Ok(())
}
