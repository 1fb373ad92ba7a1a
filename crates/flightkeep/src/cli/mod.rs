//! Command-line interface for flightkeep.
//!
//! This module provides the CLI structure for the `flightkeep` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DiagnoseCommand, ExportCommand, ImportCommand, RecoverCommand, SaveCommand,
    WatchCommand,
};

use crate::logging::Verbosity;

/// flightkeep - Keep the charter flight list safe on this machine
///
/// Stores the flight list in three redundant slots, refuses accidental wipes,
/// and recovers from backups, safety snapshots and legacy keys.
#[derive(Debug, Parser)]
#[command(name = "flightkeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Report the state of every storage slot
    Diagnose(DiagnoseCommand),

    /// Load the flight list, repairing the slots if a fallback was needed
    Recover(RecoverCommand),

    /// Store a flight list from a JSON file
    Save(SaveCommand),

    /// Write the recovered flight list to an export file
    Export(ExportCommand),

    /// Merge flights from an export file into storage
    Import(ImportCommand),

    /// Auto-save a JSON file on an interval until interrupted
    Watch(WatchCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
