//! # Speky
//!
//! Checks and serves a traceability graph of requirements, tests and
//! comments.
//!
//! ## Usage
//!
//! ```bash
//! # Validate a set of files
//! speky check requirements.yaml tests.yaml comments.yaml -C review.csv
//!
//! # Serve MCP tool calls on stdin/stdout
//! speky mcp requirements.yaml tests.yaml
//! ```
//!
//! Logs always go to stderr; stdout carries command output or protocol
//! responses only.

mod cli;

use clap::Parser;
use cli::LogFormat;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = cli::Cli::parse();

    // SPEKY_LOG_FORMAT=json enables machine-parseable output.
    let log_format = cli.log_format.unwrap_or_else(|| {
        match std::env::var("SPEKY_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    });
    let default_filter = if cli.verbose {
        "speky=debug"
    } else {
        "speky=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(false),
                )
                .init();
        }
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
