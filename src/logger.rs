//! Log setup: `RUST_LOG` is honoured, dependencies default to warnings.

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Log level for this crate's own records.
pub fn crate_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

pub fn setup_logging(verbose: bool) {
    let result = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_CRATE_NAME"), crate_level(verbose))
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let line = match record.level() {
                Level::Error => format!("[{} {}] {}", name.cyan(), "ERROR".red(), record.args()),
                Level::Warn => format!("[{} {}] {}", name.cyan(), "WARN".yellow(), record.args()),
                Level::Info => format!("[{}] {}", name.cyan(), record.args()),
                Level::Debug | Level::Trace => format!(
                    "[{} {}] {}",
                    name.cyan(),
                    record.target().white(),
                    record.args()
                ),
            };
            writeln!(buf, "{}", line)
        })
        .try_init();

    if let Err(e) = result {
        eprintln!("Logger already initialized: {}", e);
    }
}
