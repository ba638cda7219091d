// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pcrseal: inspect and replay canonical event logs.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pcrseal_core::config::SealConfig;
use pcrseal_core::error::Result;
use pcrseal_core::types::HashAlgorithm;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pcrseal")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every record of an event log
    Dump {
        /// Event log file
        log: PathBuf,
    },

    /// Recompute register values from an event log
    Replay {
        /// Event log file
        log: PathBuf,

        /// Bank to replay (repeatable); defaults to the configured log algorithms
        #[arg(short, long)]
        algorithm: Vec<HashAlgorithm>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, class = ?e.class(), "pcrseal failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => SealConfig::load(path)?,
        None => SealConfig::default(),
    };

    match cli.command {
        Commands::Dump { log } => print_json(&commands::dump(&log)?),
        Commands::Replay { log, algorithm } => {
            let algorithms = if algorithm.is_empty() {
                config.log_algorithms
            } else {
                algorithm
            };
            print_json(&commands::replay(&log, &algorithms)?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
