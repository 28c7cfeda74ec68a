use std::process::ExitCode;

use clap::Parser;
use stockledger_core::LedgerError;

mod cli;
mod commands;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    match commands::run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = err
                .downcast_ref::<LedgerError>()
                .map(LedgerError::kind)
                .unwrap_or("error");
            eprintln!("error [{kind}]: {err:#}");
            ExitCode::FAILURE
        }
    }
}
