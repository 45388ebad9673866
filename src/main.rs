//! Morph - local caches for source mirrors and build artifacts
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use morph::cli::{Cli, Commands};
use morph::config::ConfigManager;
use morph::error::MorphResult;
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

async fn run() -> MorphResult<()> {
    let cli = Cli::parse();

    // Escaping needs neither config nor logging
    if let Commands::Escape { ref url } = cli.command {
        return morph::cli::commands::escape(url).await;
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = config_manager.load().await?;
    cli.apply_overrides(&mut config);

    // 0 = warn (spinners only), 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("morph=warn"),
        1 => EnvFilter::new("morph=info"),
        _ => EnvFilter::new("morph=debug"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }

    debug!("Using config {}", config_manager.path().display());
    debug!("Cache root {}", config.cache_dir().display());

    match cli.command {
        Commands::Escape { .. } => Ok(()),
        Commands::Repo(args) => morph::cli::commands::repo(args, &config).await,
        Commands::Resolve(args) => morph::cli::commands::resolve(args, &config).await,
        Commands::Artifacts(args) => morph::cli::commands::artifacts(args, &config).await,
        Commands::Config(args) => {
            morph::cli::commands::config(args, &config_manager, &config).await
        }
    }
}
