//! # dialnet CLI Module
//!
//! This module implements the CLI interface for dialnet.
//!
//! ## Available Commands
//!
//! - `apply` - Replay an edit script and summarise the resulting model
//! - `check` - Replay an edit script and verify every model invariant
//! - `normalize` - Show how a text maps to an identifier

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use dialnet_core::DialnetError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// dialnet - conversation network editor
///
/// Replays edit scripts against the network model and reports the outcome.
#[derive(Parser, Debug)]
#[command(name = "dialnet")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay an edit script
    Apply {
        /// Path to the script (JSON array of commands)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Replay an edit script and verify model consistency
    Check {
        /// Path to the script (JSON array of commands)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the normalized identifier for a text
    Normalize {
        /// Text to normalize
        text: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and loaded configuration.
pub fn execute(cli: Cli, config: &AppConfig) -> Result<(), DialnetError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Apply { file } => cmd_apply(config, &file, json_mode, cli.verbose),
        Commands::Check { file } => cmd_check(config, &file, json_mode),
        Commands::Normalize { text } => cmd_normalize(config, &text, json_mode),
    }
}
