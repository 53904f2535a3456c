use clap::Parser;
use mimeroute::cli::{Cli, run_cli};
use mimeroute::logger::setup_logging;
use mimeroute::output::OutputFormatter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run_cli(&cli) {
        Ok(summary) if summary.failed_roots.is_empty() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(2),
        Err(e) => {
            OutputFormatter::error(&e);
            ExitCode::FAILURE
        }
    }
}
