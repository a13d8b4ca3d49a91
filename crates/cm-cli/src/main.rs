use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cm_cli::commands::{config, merge};
use cm_cli::{Cli, Commands, Config, OverrideArgs};

/// Load config and apply command-line overrides.
fn load_config(config_path: Option<&Path>, overrides: &OverrideArgs) -> Result<Config> {
    let mut config = Config::load_from(config_path).context("failed to load configuration")?;
    config.apply_overrides(overrides);
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr; stdout carries the event stream
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match &cli.command {
        Some(Commands::Merge(args)) => {
            let config = load_config(cli.config.as_deref(), &args.overrides)?;
            let stats = merge::run(args, &config)?;
            eprintln!(
                "processed {} events in {} runs ({} merged into {})",
                stats.events, stats.runs, stats.merged, config.merge.output_collection
            );
        }
        Some(Commands::Config(overrides)) => {
            let config = load_config(cli.config.as_deref(), overrides)?;
            config::run(&mut std::io::stdout().lock(), &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
