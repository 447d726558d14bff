use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

const DEFAULT_LEVEL: &str = "info";
const LOG_FILE_PREFIX: &str = "hwdash.log";

/// Initializes logging into a daily rolling file; stdout is reserved for command output.
///
/// `RUST_LOG` wins over the configured level. The returned guard flushes the writer when
/// dropped and must be held for the life of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
  let directory = log_directory(config)?;
  std::fs::create_dir_all(&directory)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", directory.display(), e))?;

  let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| filter_directive(config));

  let appender = tracing_appender::rolling::daily(&directory, LOG_FILE_PREFIX);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let fmt_layer = tracing_subscriber::fmt::layer()
    .with_writer(writer)
    .with_ansi(false)
    .with_target(true)
    .with_filter(EnvFilter::new(&rust_log));

  tracing_subscriber::registry()
    .with(fmt_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}

fn filter_directive(config: &LoggingConfig) -> String {
  config
    .level
    .clone()
    .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

fn log_directory(config: &LoggingConfig) -> Result<PathBuf> {
  if let Some(dir) = &config.directory {
    return Ok(dir.clone());
  }

  dirs::data_dir()
    .map(|dir| dir.join("hwdash"))
    .ok_or_else(|| eyre!("Could not determine a log directory; set logging.directory"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_configured_directory_wins() {
    let config = LoggingConfig {
      level: None,
      directory: Some(PathBuf::from("/var/log/hwdash")),
    };
    assert_eq!(log_directory(&config).unwrap(), PathBuf::from("/var/log/hwdash"));
  }

  #[test]
  fn test_filter_directive() {
    assert_eq!(filter_directive(&LoggingConfig::default()), "info");

    let config = LoggingConfig {
      level: Some("hwdash=debug".to_string()),
      directory: None,
    };
    assert_eq!(filter_directive(&config), "hwdash=debug");
  }
}
