//! # Speky CLI Module
//!
//! ## Available Commands
//!
//! - `check` - Load and validate specification files, print a summary
//! - `mcp` - Load and validate, then serve queries over stdin/stdout

mod commands;

use clap::{Args, Parser, Subcommand, ValueEnum};
use speky::sources::SourceSet;
use speky_core::SpekyError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Speky - requirements and tests traceability
///
/// Loads requirements, tests and comments from YAML (and comment CSV) files,
/// checks every cross-reference, and answers queries about the result.
#[derive(Parser, Debug)]
#[command(name = "speky")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format (defaults to SPEKY_LOG_FORMAT, then text)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and validate the files, then print a summary
    Check {
        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Load and validate the files, then serve queries on stdin/stdout
    Mcp {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

/// Input files shared by every command.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// YAML files containing requirements, tests or comments
    #[arg(value_name = "FILE", required = true)]
    pub paths: Vec<PathBuf>,

    /// CSV files containing comments
    #[arg(short = 'C', long = "comment-csv", value_name = "FILE")]
    pub comment_csvs: Vec<PathBuf>,
}

impl SourceArgs {
    fn source_set(&self) -> SourceSet {
        SourceSet::new(self.paths.clone(), self.comment_csvs.clone())
    }
}

// =============================================================================
// COMMAND DISPATCH
// =============================================================================

/// Execute the parsed command.
pub async fn execute(cli: Cli) -> Result<(), SpekyError> {
    match cli.command {
        Commands::Check { sources } => cmd_check(&sources, cli.json_mode),
        Commands::Mcp { sources } => cmd_mcp(&sources).await,
    }
}
