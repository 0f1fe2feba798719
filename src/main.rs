//! incierto CLI
//!
//! Training entry point for the incierto library.
//!
//! # Usage
//!
//! ```bash
//! # Train from config
//! incierto train config.yaml
//!
//! # Train with overrides, on synthetic data
//! incierto train config.yaml --epochs 10 --synth
//!
//! # Resume an interrupted run
//! incierto train config.yaml --resume
//!
//! # Evaluate the last checkpoint
//! incierto test config.yaml
//! ```

use clap::Parser;
use incierto::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
