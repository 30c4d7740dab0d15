//! kbc-app-kit CLI
//!
//! Runs one data app step per invocation; results go to stdout as JSON
//! lines, logs go to stderr.

use clap::Parser;
use kbc_app_kit::cli::{Cli, Runner};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status when the access gate refuses the user
const EXIT_ACCESS_DENIED: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match Runner::new(cli).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if e.halts_app() {
                ExitCode::from(EXIT_ACCESS_DENIED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// `RUST_LOG` wins; otherwise info, or debug with `--verbose`
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}
