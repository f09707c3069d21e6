//! buildcache - Local build artifact cache
//!
//! CLI entry point that dispatches to subcommands.

use buildcache::cache::CacheStore;
use buildcache::cli::{Cli, Commands};
use buildcache::config::ConfigManager;
use buildcache::error::{CacheError, CacheResult};
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CacheResult<ExitCode> {
    let cli = Cli::parse();

    let project_dir = match cli.project {
        Some(ref path) => path.clone(),
        None => {
            std::env::current_dir().map_err(|e| CacheError::io("getting current directory", e))?
        }
    };

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    let local_config_path = if cli.no_local {
        None
    } else {
        ConfigManager::find_local_config(&project_dir)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    init_logging(cli.verbose, &config.general.log_format);
    if let Some(ref path) = local_config_path {
        debug!("Using local config: {}", path.display());
    }

    let store = CacheStore::from_config(&config, &project_dir);
    debug!("Cache root: {}", store.root().display());

    // Dispatch to command
    match cli.command {
        Commands::Resolve(args) => buildcache::cli::commands::resolve(args, &store).await,
        Commands::Upload(args) => buildcache::cli::commands::upload(args, &store).await,
        Commands::List(args) => buildcache::cli::commands::list(args, &store).await,
        Commands::Config(args) => {
            buildcache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// Logs go to stderr; stdout carries only command output (cache paths).
/// 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, log_format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("buildcache=warn"),
        1 => EnvFilter::new("buildcache=info"),
        _ => EnvFilter::new("buildcache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
