mod api;
mod app;
mod cache;
mod commands;
mod config;
mod logging;
#[cfg(test)]
mod test_support;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hwdash")]
#[command(about = "Console for the hardware distribution backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/hwdash/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Backend base URL, overrides backend.url from the config file
  #[arg(short, long, global = true)]
  backend: Option<String>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override backend if specified on command line
  if let Some(url) = args.backend {
    config.backend.url = url;
  }

  let _log_guard = logging::init_logging(&config.logging)?;

  let app = app::App::new(&config, config::Config::get_api_token())?;
  let result = commands::run(&app, args.command, &mut std::io::stdout().lock()).await;

  if let Err(e) = &result {
    tracing::error!("{:?}", e);
  }
  result
}
