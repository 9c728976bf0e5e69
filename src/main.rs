//! Vise: advisory lock coordination for CAD files on shared storage.
//!
//! This is the main entry point for the `vise` CLI. It parses arguments,
//! dispatches to the appropriate command handler, and handles errors with
//! proper exit codes.

mod cli;
mod commands;
pub mod config;
pub mod context;
pub mod daemon;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod identity;
pub mod locks;
pub mod monitor;
pub mod server;

use cli::Cli;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_default_env().init();

    let cli = Cli::parse_args();

    match commands::dispatch(cli.lock_dir, cli.command) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {}", err);

            // Return appropriate exit code
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
