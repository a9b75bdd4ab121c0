use std::process::ExitCode;

use publogs_core::logging;

mod cli;

use crate::cli::CliCommand;

fn main() -> ExitCode {
    // Initialize logging as early as possible; a missing state dir is not fatal.
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("log file unavailable, logging to stderr: {:#}", err);
    }

    let runtime = match cli::runtime() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("publogs error: cannot start async runtime: {}", err);
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(CliCommand::run_from_args()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("publogs error: {:#}", err);
            ExitCode::from(1)
        }
    }
}
