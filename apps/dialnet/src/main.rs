//! # dialnet
//!
//! Command-line driver for the dialnet conversation network model.
//!
//! ## Usage
//!
//! ```bash
//! # Replay an edit script
//! dialnet apply -f design.json
//!
//! # Replay and verify every invariant
//! dialnet check -f design.json --json-mode
//!
//! # Preview identifier normalization
//! dialnet normalize "Ask for Name"
//! ```

use clap::Parser;
use dialnet::cli;
use dialnet::config::{AppConfig, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    let config = match AppConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    init_tracing(config.log_format(), cli.verbose);

    if let Err(e) = cli::execute(cli, &config) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing. `DIALNET_LOG` wins over `RUST_LOG`.
fn init_tracing(format: LogFormat, verbose: bool) {
    let default_directive = if verbose { "dialnet=debug" } else { "dialnet=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("DIALNET_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| default_directive.into());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
