use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub backend: BackendConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Base URL of the REST backend, e.g. "https://erp.example.com/api/"
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_ttl_secs")]
  pub default_ttl_secs: u64,
  /// How often expired entries are swept out; 0 disables the sweeper
  #[serde(default = "default_sweep_interval_secs")]
  pub sweep_interval_secs: u64,
  /// TTL in seconds per resource path (case-insensitive)
  #[serde(default, deserialize_with = "deserialize_lowercase_map")]
  pub ttl_overrides: BTreeMap<String, u64>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      default_ttl_secs: default_ttl_secs(),
      sweep_interval_secs: default_sweep_interval_secs(),
      ttl_overrides: BTreeMap::new(),
    }
  }
}

impl CacheConfig {
  pub fn default_ttl(&self) -> Duration {
    Duration::from_secs(self.default_ttl_secs)
  }

  /// TTL for reads of the resource at `path`
  pub fn ttl_for(&self, path: &str) -> Duration {
    self
      .ttl_overrides
      .get(path)
      .map(|secs| Duration::from_secs(*secs))
      .unwrap_or_else(|| self.default_ttl())
  }

  pub fn sweep_interval(&self) -> Option<Duration> {
    (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
  /// Default filter directive; RUST_LOG takes precedence
  pub level: Option<String>,
  /// Directory for log files (defaults to the data directory)
  pub directory: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_ttl_secs() -> u64 {
  300
}

fn default_sweep_interval_secs() -> u64 {
  60
}

fn deserialize_lowercase_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, u64>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: BTreeMap<String, u64> = BTreeMap::deserialize(deserializer)?;
  Ok(v.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect())
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./hwdash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/hwdash/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/hwdash/config.yaml\n\
                 with at least backend.url set."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("hwdash.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("hwdash").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Get the backend API token from environment variables.
  ///
  /// Checks HWDASH_API_TOKEN first, then API_TOKEN as fallback. Requests are sent
  /// unauthenticated when neither is set.
  pub fn get_api_token() -> Option<String> {
    std::env::var("HWDASH_API_TOKEN")
      .or_else(|_| std::env::var("API_TOKEN"))
      .ok()
      .filter(|token| !token.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::from_yaml("backend:\n  url: https://erp.example.com/api/\n").unwrap();

    assert_eq!(config.backend.timeout_secs, 30);
    assert_eq!(config.cache.default_ttl(), Duration::from_secs(300));
    assert_eq!(config.cache.sweep_interval(), Some(Duration::from_secs(60)));
    assert!(config.logging.level.is_none());
  }

  #[test]
  fn test_ttl_overrides_are_case_insensitive() {
    let config = Config::from_yaml(
      r#"
backend:
  url: https://erp.example.com/api/
cache:
  default_ttl_secs: 120
  sweep_interval_secs: 0
  ttl_overrides:
    Products: 900
    orders: 30
"#,
    )
    .unwrap();

    assert_eq!(config.cache.ttl_for("products"), Duration::from_secs(900));
    assert_eq!(config.cache.ttl_for("orders"), Duration::from_secs(30));
    assert_eq!(config.cache.ttl_for("companies"), Duration::from_secs(120));
    assert_eq!(config.cache.sweep_interval(), None);
  }

  #[test]
  fn test_missing_backend_is_an_error() {
    assert!(Config::from_yaml("cache:\n  default_ttl_secs: 10\n").is_err());
  }

  #[test]
  fn test_load_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "backend:\n  url: http://localhost:8080/api/\n  timeout_secs: 5").unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.backend.url, "http://localhost:8080/api/");
    assert_eq!(config.backend.timeout_secs, 5);
  }

  #[test]
  fn test_load_missing_explicit_path() {
    let err = Config::load(Some(Path::new("/nonexistent/hwdash.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
