//! pyinfer CLI - type inference for Python projects

use clap::Parser;
use pyinfer::cli::Cli;
use simple_logger::SimpleLogger;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = SimpleLogger::new().with_level(cli.log_level()).init() {
        eprintln!("Error: cannot initialise logging: {}", e);
    }

    match cli.run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
