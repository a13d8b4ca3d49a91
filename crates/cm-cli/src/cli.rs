//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Collection merger.
///
/// Reads events as JSON lines, merges the configured collections of every
/// event into one subset collection, and writes the events back out.
#[derive(Debug, Parser)]
#[command(name = "cm", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Merge collections in every event of a JSONL stream.
    Merge(MergeArgs),

    /// Print the effective configuration.
    Config(OverrideArgs),
}

/// Arguments for the merge command.
#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Read events from this file instead of stdin.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Write events to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

/// Command-line overrides for the loaded configuration.
#[derive(Debug, Default, Args)]
pub struct OverrideArgs {
    /// Input collection to merge (repeatable, replaces the configured list).
    #[arg(long = "collection", value_name = "NAME")]
    pub collections: Vec<String>,

    /// Source ID for the input collection at the same position (repeatable).
    #[arg(long = "id", value_name = "ID", allow_negative_numbers = true)]
    pub ids: Vec<i32>,

    /// Name of the merged collection.
    #[arg(long, value_name = "NAME")]
    pub output_collection: Option<String>,

    /// Merge events on a thread pool.
    #[arg(long)]
    pub parallel: bool,
}
