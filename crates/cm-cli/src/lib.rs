//! Collection merger CLI library.
//!
//! This crate provides the CLI interface for the collection merger.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, MergeArgs, OverrideArgs};
pub use config::Config;
