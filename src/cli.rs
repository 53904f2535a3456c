//! Command-line interface module for mimeroute.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Merging arguments with the configuration file
//! - Validation of sources and destinations
//! - Running the pipelines and printing work items

use crate::config::{ConfigFile, RunPlan};
use crate::output::{OutputFormat, OutputFormatter, PrintSink};
use crate::pipeline::{PipelineMode, RunSummary, run_all};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

/// Distributes files to per-type directories based on their MIME type.
#[derive(Debug, Clone, Parser)]
#[command(name = "mimeroute", version)]
#[command(about = "Distributes files based on MIME type.")]
#[command(after_help = "Example: mimeroute -s ~/import -d image=~/photos -d video=~/videos")]
pub struct Cli {
    /// Source directory. Can be repeated.
    #[arg(long = "src", short = 's', value_name = "DIR")]
    pub sources: Vec<PathBuf>,

    /// Destination for a MIME top-level type, in the form TYPE=DIR. Can be repeated.
    #[arg(long = "dst", short = 'd', value_name = "TYPE=DIR")]
    pub destinations: Vec<String>,

    /// Configuration file. Default: .mimerouterc.toml, then ~/.config/mimeroute/config.toml.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format of routed files.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Stop after this many files have been routed.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub limit: Option<u64>,

    /// Walk and route on a single thread.
    #[arg(long)]
    pub sync: bool,

    /// Print per-category totals when done.
    #[arg(long)]
    pub summary: bool,

    /// Show a spinner while routing.
    #[arg(long)]
    pub progress: bool,

    /// Verbose output.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    pub fn mode(&self) -> PipelineMode {
        if self.sync {
            PipelineMode::SingleThread
        } else {
            PipelineMode::Threaded
        }
    }
}

/// Loads configuration, merges CLI arguments and validates the result.
pub fn build_plan(cli: &Cli) -> Result<RunPlan, String> {
    let mut config = ConfigFile::load(cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    config
        .merge_cli(&cli.sources, &cli.destinations)
        .map_err(|e| format!("{}. See --help.", e))?;
    RunPlan::build(config).map_err(|e| e.to_string())
}

/// Prints the banner describing what will be routed where.
pub fn announce(plan: &RunPlan) {
    let sources: Vec<String> = plan
        .sources
        .iter()
        .map(|s| s.path().display().to_string())
        .collect();
    OutputFormatter::info(&format!("Will read files from directories: {:?}", sources));
    for (category, dir) in plan.context.categories.iter() {
        OutputFormatter::info(&format!(
            "... and route files of type {}/* to: {}",
            category,
            dir.display()
        ));
    }
}

/// Runs a validated plan, writing work items to `out`.
pub fn execute<W: Write>(cli: &Cli, plan: &RunPlan, out: W) -> RunSummary {
    let progress = cli.progress.then(OutputFormatter::create_spinner);
    let mut sink = PrintSink::new(out, cli.format)
        .with_limit(cli.limit.map(|n| usize::try_from(n).unwrap_or(usize::MAX)))
        .with_progress(progress);

    let summary = run_all(&plan.context, &plan.sources, &mut sink, cli.mode());
    sink.finish();

    if summary.stopped_early {
        log::debug!("Stopped after {} files", summary.total());
    }
    summary
}

/// Runs the CLI application with parsed arguments.
///
/// Configuration errors are returned as `Err`; per-root failures are reported
/// as they happen and recorded in the returned summary.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use mimeroute::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["mimeroute", "-s", "/import", "-d", "image=/photos"]);
/// match run_cli(&cli) {
///     Ok(summary) => println!("{} files routed", summary.total()),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(cli: &Cli) -> Result<RunSummary, String> {
    let plan = build_plan(cli)?;
    announce(&plan);

    let stdout = std::io::stdout();
    let summary = execute(cli, &plan, stdout.lock());

    if cli.summary {
        OutputFormatter::summary_table(&summary);
    }
    if !summary.failed_roots.is_empty() {
        OutputFormatter::error(&format!(
            "{} of {} sources could not be read",
            summary.failed_roots.len(),
            plan.sources.len()
        ));
    }
    Ok(summary)
}
