use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub session: SessionConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Backend root, e.g. `https://api.example.com`. Requests go to `{url}/enterprise/...`
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// When false, query results are never stored (requests are still de-duplicated)
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Age after which a cached result is refetched on next read
  #[serde(default = "default_stale_time_secs")]
  pub stale_time_secs: u64,
  /// How long a result nobody is subscribed to is kept around
  #[serde(default = "default_keep_unused_secs")]
  pub keep_unused_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      stale_time_secs: default_stale_time_secs(),
      keep_unused_secs: default_keep_unused_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
  #[serde(default = "default_refresh_interval_secs")]
  pub refresh_interval_secs: u64,
  /// SQLite file holding the persisted tokens (default: $XDG_DATA_HOME/cbt-admin/session.db)
  pub storage_path: Option<PathBuf>,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      refresh_interval_secs: default_refresh_interval_secs(),
      storage_path: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      file: None,
    }
  }
}

/// Upper bound for every configured duration (one year).
const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

fn default_true() -> bool {
  true
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_stale_time_secs() -> u64 {
  300
}

fn default_keep_unused_secs() -> u64 {
  60
}

fn default_refresh_interval_secs() -> u64 {
  300
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./cbt-admin.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/cbt-admin/config.yaml
  ///
  /// `CBT_ADMIN_API_URL` overrides `api.url` after loading.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/cbt-admin/config.yaml\n\
                 See config.example.yaml for the format."
        ))
      }
    };

    if let Ok(url) = std::env::var("CBT_ADMIN_API_URL") {
      config.api.url = url;
    }
    config.validate()?;

    Ok(config)
  }

  /// Parse a configuration document.
  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("cbt-admin.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("cbt-admin").join("config.yaml");
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

  fn validate(&self) -> Result<()> {
    let url = url::Url::parse(&self.api.url)
      .map_err(|e| eyre!("Invalid api.url '{}': {}", self.api.url, e))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(eyre!("api.url must be http or https, got '{}'", url.scheme()));
    }
    if self.session.refresh_interval_secs == 0 {
      return Err(eyre!("session.refresh_interval_secs must be greater than zero"));
    }

    for (name, secs) in [
      ("api.timeout_secs", self.api.timeout_secs),
      ("cache.stale_time_secs", self.cache.stale_time_secs),
      ("cache.keep_unused_secs", self.cache.keep_unused_secs),
      ("session.refresh_interval_secs", self.session.refresh_interval_secs),
    ] {
      if secs > MAX_DURATION_SECS {
        return Err(eyre!("{} must be at most {} seconds, got {}", name, MAX_DURATION_SECS, secs));
      }
    }
    Ok(())
  }

  /// Get the login password from the environment.
  ///
  /// Checks CBT_ADMIN_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("CBT_ADMIN_PASSWORD")
      .map_err(|_| eyre!("Password not found. Pass --password or set CBT_ADMIN_PASSWORD."))
  }

  /// Path of the durable session database.
  pub fn session_db_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.session.storage_path {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("cbt-admin").join("session.db"))
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

impl CacheConfig {
  pub fn stale_time(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.stale_time_secs.min(MAX_DURATION_SECS) as i64)
  }

  pub fn keep_unused(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.keep_unused_secs.min(MAX_DURATION_SECS) as i64)
  }
}

impl SessionConfig {
  pub fn refresh_interval(&self) -> Duration {
    Duration::from_secs(self.refresh_interval_secs)
  }
}
