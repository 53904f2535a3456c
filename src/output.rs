//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output. Status lines go to
//! stderr: informational messages are prefixed with a cyan `***`, errors with a
//! red `!!!`. Work items go to stdout, one per line, so they can be piped.

use crate::pipeline::{PipelineError, RunSummary, SinkError, WorkItemSink};
use crate::router::WorkItem;
use clap::ValueEnum;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::ops::ControlFlow;
use std::time::Duration;

/// Manages all CLI status output with consistent styling.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints an informational message prefixed with a cyan `***`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mimeroute::output::OutputFormatter;
    /// OutputFormatter::info("Will read files from directories: [\"/import\"]");
    /// ```
    pub fn info(message: &str) {
        eprintln!("{} {}", "***".cyan(), message);
    }

    /// Prints an error message prefixed with a red `!!!`.
    pub fn error(message: &str) {
        eprintln!("{} {}", "!!!".red(), message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        eprintln!("\n{}", header.bold());
    }

    /// Creates a spinner counting routed files.
    pub fn create_spinner() -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.cyan} {pos} files routed {msg}")
        {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    /// Prints a summary table with routed file counts by category.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mimeroute::output::OutputFormatter;
    /// use mimeroute::pipeline::RunSummary;
    ///
    /// let mut summary = RunSummary::default();
    /// summary.per_category.insert("image".to_string(), 8);
    /// summary.per_category.insert("video".to_string(), 1);
    /// OutputFormatter::summary_table(&summary);
    /// ```
    pub fn summary_table(summary: &RunSummary) {
        Self::header("SUMMARY");

        let max_category_len = summary
            .per_category
            .keys()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        eprintln!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        eprintln!("{}", "-".repeat(max_category_len + 10));

        for (category, count) in &summary.per_category {
            eprintln!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count),
                width = max_category_len
            );
        }

        let total = summary.total();
        eprintln!("{}", "-".repeat(max_category_len + 10));
        eprintln!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            plural(total),
            width = max_category_len
        );

        if summary.item_errors > 0 {
            eprintln!("{} files skipped", summary.item_errors.to_string().red());
        }
        for root in &summary.failed_roots {
            eprintln!("{} {}", "failed:".red(), root.display());
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// Format of work-item lines written by [`PrintSink`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `SOURCE -> DESTINATION`
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Writes work items to a stream, optionally stopping after a number of items.
pub struct PrintSink<W: Write> {
    out: W,
    format: OutputFormat,
    limit: Option<usize>,
    written: usize,
    progress: Option<ProgressBar>,
}

impl<W: Write> PrintSink<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            limit: None,
            written: 0,
            progress: None,
        }
    }

    /// Stops the run once `limit` items were written.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Flushes output, clears the spinner and returns the writer.
    pub fn finish(mut self) -> W {
        if let Err(e) = self.out.flush() {
            log::warn!("Failed to flush output: {}", e);
        }
        if let Some(pb) = self.progress.take() {
            pb.finish_and_clear();
        }
        self.out
    }

    /// Renders one output line. JSON needs UTF-8 paths; text output is lossy.
    fn format_item(&self, item: &WorkItem) -> Result<String, SinkError> {
        match self.format {
            OutputFormat::Text => Ok(format!(
                "{} -> {}",
                item.source.display(),
                item.destination.display()
            )),
            OutputFormat::Json => serde_json::to_string(item).map_err(|e| SinkError::Encode {
                source: item.source.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

impl<W: Write> WorkItemSink for PrintSink<W> {
    fn accept(&mut self, item: WorkItem) -> Result<ControlFlow<()>, SinkError> {
        if self.limit.is_some_and(|limit| self.written >= limit) {
            return Err(SinkError::Closed);
        }
        let line = self.format_item(&item)?;
        if let Err(e) = writeln!(self.out, "{}", line) {
            // a closed pipe ends the run quietly
            return Err(match e.kind() {
                std::io::ErrorKind::BrokenPipe => SinkError::Closed,
                _ => SinkError::Write(e),
            });
        }
        self.written += 1;
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
        Ok(match self.limit {
            Some(limit) if self.written >= limit => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        })
    }

    fn report_error(&mut self, error: &PipelineError) {
        let message = error.to_string();
        match &self.progress {
            Some(pb) => pb.suspend(|| OutputFormatter::error(&message)),
            None => OutputFormatter::error(&message),
        }
    }
}
