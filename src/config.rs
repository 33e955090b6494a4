use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::db;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Directory for the task database, cache database and log file
  /// (defaults to $XDG_DATA_HOME/shortlist)
  pub data_dir: Option<PathBuf>,
  /// Default log filter when SHORTLIST_LOG is unset
  #[serde(default = "default_log_level")]
  pub log_level: String,
  #[serde(default)]
  pub worker: WorkerConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_dir: None,
      log_level: default_log_level(),
      worker: WorkerConfig::default(),
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
  /// Origin the shell resources are resolved against
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Cache bucket name; change it to roll out a new version
  #[serde(default = "default_cache_name")]
  pub cache_name: String,
  /// Paths cached on install, relative to `base_url`
  #[serde(default = "default_shell_resources")]
  pub shell_resources: Vec<String>,
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      cache_name: default_cache_name(),
      shell_resources: default_shell_resources(),
    }
  }
}

fn default_base_url() -> String {
  "http://localhost:5173/".to_string()
}

fn default_cache_name() -> String {
  "shortlist-v1".to_string()
}

fn default_shell_resources() -> Vec<String> {
  vec![
    "./".to_string(),
    "./index.html".to_string(),
    "./manifest.json".to_string(),
  ]
}

impl WorkerConfig {
  pub fn base_url(&self) -> Result<Url> {
    Url::parse(&self.base_url).map_err(|e| eyre!("Invalid worker base_url {}: {}", self.base_url, e))
  }

  /// Shell resources as absolute URLs.
  pub fn shell_urls(&self) -> Result<Vec<Url>> {
    let base = self.base_url()?;
    self
      .shell_resources
      .iter()
      .map(|path| {
        base
          .join(path)
          .map_err(|e| eyre!("Invalid shell resource {}: {}", path, e))
      })
      .collect()
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./shortlist.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/shortlist/config.yaml
  ///
  /// Without a config file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("shortlist.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("shortlist").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Resolved data directory.
  pub fn data_dir(&self) -> Result<PathBuf> {
    match &self.data_dir {
      Some(dir) => Ok(dir.clone()),
      None => db::data_dir(),
    }
  }

  pub fn database_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("shortlist.db"))
  }

  pub fn cache_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("cache.db"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.log_level, "info");
    assert_eq!(config.worker.cache_name, "shortlist-v1");
    let urls: Vec<String> = config
      .worker
      .shell_urls()
      .unwrap()
      .into_iter()
      .map(String::from)
      .collect();
    assert_eq!(
      urls,
      vec![
        "http://localhost:5173/",
        "http://localhost:5173/index.html",
        "http://localhost:5173/manifest.json"
      ]
    );
  }

  #[test]
  fn test_shell_resources_resolve_under_base_path() {
    let worker = WorkerConfig {
      base_url: "https://example.github.io/shortlist/".to_string(),
      ..Default::default()
    };
    let urls = worker.shell_urls().unwrap();
    assert_eq!(urls[1].as_str(), "https://example.github.io/shortlist/index.html");
  }

  #[test]
  fn test_load_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(
      &path,
      "data_dir: /tmp/shortlist-test\nworker:\n  cache_name: shortlist-v2\n",
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.worker.cache_name, "shortlist-v2");
    assert_eq!(config.worker.shell_resources.len(), 3);
    assert_eq!(config.log_level, "info");
    assert_eq!(
      config.database_path().unwrap(),
      PathBuf::from("/tmp/shortlist-test/shortlist.db")
    );
  }

  #[test]
  fn test_explicit_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::load(Some(&dir.path().join("nope.yaml"))).is_err());
  }

  #[test]
  fn test_invalid_yaml_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "worker: [unclosed").unwrap();
    assert!(Config::load(Some(&path)).is_err());
  }
}
