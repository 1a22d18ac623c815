//! mp-challenge - cached proxy over the challenge data API
//!
//! Reads configuration from the environment (and `.env`), sets up logging and
//! runs one command.

use std::io;
use std::process::ExitCode;

use clap::Parser;

use mp_challenge::cli::{self, Cli};
use mp_challenge::config::AppConfig;
use mp_challenge::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::from_env().map_err(cli::CliError::from) {
        Ok(config) => config,
        Err(e) => return fail(e),
    };

    if let Err(e) = logging::init(config.log_file.as_deref()) {
        eprintln!("Error: could not open log file: {}", e);
        return ExitCode::FAILURE;
    }

    let config = match cli.apply_overrides(config) {
        Ok(config) => config,
        Err(e) => return fail(e),
    };

    let mut stdout = io::stdout().lock();
    match cli::run(cli.command, &config, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn fail(e: cli::CliError) -> ExitCode {
    log::error!("{}", e);
    eprintln!("Error: {}", e);
    ExitCode::FAILURE
}
