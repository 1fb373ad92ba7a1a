//! CLI command definitions.
//!
//! This module defines the arguments of every `flightkeep` subcommand.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Diagnose command arguments.
#[derive(Debug, Args)]
pub struct DiagnoseCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Recover command arguments.
#[derive(Debug, Args)]
pub struct RecoverCommand {
    /// Print the recovered flights as JSON instead of a summary
    #[arg(short, long)]
    pub json: bool,
}

/// Save command arguments.
#[derive(Debug, Args)]
pub struct SaveCommand {
    /// JSON file holding the flight list (envelope object or bare array)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Allow replacing stored flights with an empty list
    #[arg(short, long)]
    pub force: bool,
}

/// Export command arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Where to write the export (defaults to a dated file in the current directory)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Import command arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Export file, slot dump or bare JSON array to merge in
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Watch command arguments.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// JSON file whose current contents are saved on every tick
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Override the configured auto-save interval
    #[arg(short, long, value_name = "MS")]
    pub interval_ms: Option<u64>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_command_debug() {
        let cmd = SaveCommand {
            file: PathBuf::from("flights.json"),
            force: true,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("flights.json"));
        assert!(debug_str.contains("force: true"));
    }

    #[test]
    fn test_watch_command_debug() {
        let cmd = WatchCommand {
            file: PathBuf::from("live.json"),
            interval_ms: Some(250),
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("interval_ms"));
        assert!(debug_str.contains("250"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
