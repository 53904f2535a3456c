//! mimeroute - route files to per-category directories by MIME type
//!
//! This library walks source directories, resolves each file's MIME type from
//! its extension and, for every file whose top-level type has a configured
//! destination, computes the destination path that preserves the file's
//! location below its source root. Nothing is copied or moved: callers decide
//! what to do with each [`WorkItem`].

pub mod cli;
pub mod config;
pub mod logger;
pub mod mime_table;
pub mod output;
pub mod pipeline;
pub mod router;
pub mod walker;

pub use config::{ConfigError, ConfigFile, RunPlan};
pub use mime_table::MimeTable;
pub use pipeline::{
    Pipeline, PipelineContext, PipelineMode, RunSummary, SinkError, WorkItemSink, run_all,
};
pub use router::{CategoryMap, Router, SourceRoot, WorkItem};
pub use walker::TreeWalker;

pub use cli::{Cli, run_cli};
