mod commands;

use cbt_admin::config::Config;
use cbt_admin::db::MemoryStore;
use cbt_admin::{logging, App};
use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "cbt-admin")]
#[command(about = "Administration client for the CBT enterprise dashboard")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./cbt-admin.yaml, then $XDG_CONFIG_HOME/cbt-admin/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Keep the session in memory only
  #[arg(long, global = true)]
  ephemeral: bool,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.logging)?;

  let app = if args.ephemeral {
    App::with_storage(config, Arc::new(MemoryStore::new()))?
  } else {
    App::new(config)?
  };

  commands::run(&app, args.command).await
}
