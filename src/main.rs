//! envmirror - live mirror of a key/value store's env namespace
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use envmirror::cli::{Cli, Commands};
use envmirror::config::{Config, ConfigManager};
use envmirror::error::MirrorResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> MirrorResult<()> {
    let cli = Cli::parse();

    // Check needs neither config nor logging setup
    if let Commands::Check(args) = cli.command {
        return envmirror::cli::commands::check(args).await;
    }

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Check(_) => unreachable!("Check handled above"),
        Commands::Run(args) => envmirror::cli::commands::run(args, &config).await,
        Commands::Dump(args) => envmirror::cli::commands::dump(args, &config).await,
        Commands::Config(args) => {
            envmirror::cli::commands::config(args, &config_manager, &config).await
        }
    }
}

/// 0 = warn, 1 = info (every mirrored update), 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("envmirror=warn"),
        1 => EnvFilter::new("envmirror=info"),
        _ => EnvFilter::new("envmirror=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
