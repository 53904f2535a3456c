//! Walk-then-route pipeline per source root.
//!
//! [`Pipeline::spawn`] runs the [`TreeWalker`] on its own thread and hands paths
//! to the consumer through a bounded `crossbeam_channel`, so the walker blocks
//! when the consumer falls behind. Routing happens on the consumer side as the
//! stream is iterated, which keeps work items in discovery order. Dropping the
//! stream disconnects the channel; the walker notices on its next send, stops,
//! and is joined.
//!
//! [`Pipeline::iter_sync`] produces the same sequence on the calling thread.

use crate::config::{DEFAULT_CHANNEL_CAPACITY, PathFilters};
use crate::mime_table::MimeTable;
use crate::router::{CategoryMap, RouteError, Router, SourceRoot, WorkItem};
use crate::walker::{TreeWalker, WalkError};
use crossbeam_channel::{Receiver, bounded};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Immutable state shared by every pipeline of a run.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub categories: Arc<CategoryMap>,
    pub mime_table: Arc<MimeTable>,
    pub filters: Arc<PathFilters>,
    /// Capacity of the walker handoff queue. Always at least 1.
    pub channel_capacity: usize,
}

impl PipelineContext {
    /// Context with the standard MIME table, no filters and the default queue size.
    pub fn new(categories: CategoryMap) -> Self {
        Self {
            categories: Arc::new(categories),
            mime_table: Arc::new(MimeTable::standard()),
            filters: Arc::new(PathFilters::default()),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_mime_table(mut self, mime_table: MimeTable) -> Self {
        self.mime_table = Arc::new(mime_table);
        self
    }

    pub fn with_filters(mut self, filters: Arc<PathFilters>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn router(&self) -> Router<'_> {
        Router::new(&self.categories, &self.mime_table)
    }

    fn walker(&self, root: &SourceRoot) -> Result<TreeWalker, WalkError> {
        let walker = TreeWalker::new(root.path())?;
        Ok(if self.filters.is_empty() {
            walker
        } else {
            walker.with_filters(Arc::clone(&self.filters))
        })
    }
}

/// Errors reported while draining a pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// The source root could not be walked. Ends that root's pipeline.
    Walk(WalkError),
    /// A single file could not be routed. The pipeline continues.
    Route(RouteError),
    /// The sink refused an item.
    Sink(SinkError),
}

impl PipelineError {
    /// True when the error ends the pipeline it came from.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Walk(_) => true,
            Self::Route(_) => false,
            Self::Sink(e) => e.is_fatal(),
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Walk(e) => write!(f, "{}", e),
            Self::Route(e) => write!(f, "{}", e),
            Self::Sink(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Walk(e) => Some(e),
            Self::Route(e) => Some(e),
            Self::Sink(e) => Some(e),
        }
    }
}

impl From<WalkError> for PipelineError {
    fn from(e: WalkError) -> Self {
        Self::Walk(e)
    }
}

impl From<RouteError> for PipelineError {
    fn from(e: RouteError) -> Self {
        Self::Route(e)
    }
}

impl From<SinkError> for PipelineError {
    fn from(e: SinkError) -> Self {
        Self::Sink(e)
    }
}

type StreamItem = Result<WorkItem, PipelineError>;

/// Routes one walker outcome. `None` means the file was not routable.
fn classify(
    router: Router<'_>,
    root: &Path,
    outcome: Result<PathBuf, WalkError>,
) -> Option<StreamItem> {
    match outcome {
        Ok(path) => router.route(root, &path).map_err(PipelineError::from).transpose(),
        Err(e) => Some(Err(e.into())),
    }
}

/// Pipeline constructors.
pub struct Pipeline;

impl Pipeline {
    /// Starts a threaded pipeline for `root`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mimeroute::pipeline::{Pipeline, PipelineContext};
    /// use mimeroute::router::{CategoryMap, SourceRoot};
    ///
    /// let categories: CategoryMap = [("image", "/photos")].into_iter().collect();
    /// let ctx = PipelineContext::new(categories);
    /// let root = SourceRoot::new("/import").unwrap();
    ///
    /// for item in Pipeline::spawn(&ctx, &root).flatten() {
    ///     println!("{} -> {}", item.source.display(), item.destination.display());
    /// }
    /// ```
    pub fn spawn(ctx: &PipelineContext, root: &SourceRoot) -> WorkItemStream {
        let walker = match ctx.walker(root) {
            Ok(walker) => walker,
            Err(e) => return WorkItemStream::failed(ctx, root, e),
        };
        let walk_root = walker.root().to_path_buf();

        let (path_tx, path_rx) = bounded(ctx.channel_capacity);
        let handle = thread::spawn(move || {
            let mut sent = 0_usize;
            for outcome in walker {
                if path_tx.send(outcome).is_err() {
                    log::debug!("Consumer gone, stopping walk after {} files", sent);
                    return sent;
                }
                sent += 1;
            }
            sent
        });

        WorkItemStream {
            ctx: ctx.clone(),
            root: walk_root,
            path_rx: Some(path_rx),
            walk_handle: Some(handle),
            pending: None,
        }
    }

    /// Builds a single-threaded pipeline for `root` with the same output as [`Pipeline::spawn`].
    pub fn iter_sync(ctx: &PipelineContext, root: &SourceRoot) -> SyncWorkItems {
        match ctx.walker(root) {
            Ok(walker) => SyncWorkItems {
                ctx: ctx.clone(),
                root: walker.root().to_path_buf(),
                walker: Some(walker),
                pending: None,
            },
            Err(e) => SyncWorkItems {
                ctx: ctx.clone(),
                root: root.path().to_path_buf(),
                walker: None,
                pending: Some(e.into()),
            },
        }
    }
}

/// Work items of one source root, produced by a background walker thread.
pub struct WorkItemStream {
    ctx: PipelineContext,
    root: PathBuf,
    path_rx: Option<Receiver<Result<PathBuf, WalkError>>>,
    walk_handle: Option<JoinHandle<usize>>,
    pending: Option<PipelineError>,
}

impl WorkItemStream {
    fn failed(ctx: &PipelineContext, root: &SourceRoot, error: WalkError) -> Self {
        Self {
            ctx: ctx.clone(),
            root: root.path().to_path_buf(),
            path_rx: None,
            walk_handle: None,
            pending: Some(error.into()),
        }
    }

    /// Stops the walker and waits for its thread. Returns how many files it handed over.
    pub fn shutdown(mut self) -> usize {
        self.join()
    }

    fn join(&mut self) -> usize {
        drop(self.path_rx.take());
        match self.walk_handle.take().map(JoinHandle::join) {
            Some(Ok(sent)) => sent,
            Some(Err(_)) => {
                log::error!("Walker thread for {} panicked", self.root.display());
                0
            }
            None => 0,
        }
    }
}

impl Iterator for WorkItemStream {
    type Item = StreamItem;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending.take() {
            return Some(Err(e));
        }
        let router = self.ctx.router();
        let path_rx = self.path_rx.as_ref()?;
        loop {
            let outcome = path_rx.recv().ok()?;
            if let Some(item) = classify(router, &self.root, outcome) {
                return Some(item);
            }
        }
    }
}

impl Drop for WorkItemStream {
    fn drop(&mut self) {
        self.join();
    }
}

/// Work items of one source root, walked on the calling thread.
pub struct SyncWorkItems {
    ctx: PipelineContext,
    root: PathBuf,
    walker: Option<TreeWalker>,
    pending: Option<PipelineError>,
}

impl Iterator for SyncWorkItems {
    type Item = StreamItem;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending.take() {
            return Some(Err(e));
        }
        let router = self.ctx.router();
        let walker = self.walker.as_mut()?;
        loop {
            let outcome = walker.next()?;
            if let Some(item) = classify(router, &self.root, outcome) {
                return Some(item);
            }
        }
    }
}

/// Why a sink did not take an item.
#[derive(Debug)]
pub enum SinkError {
    /// The item could not be encoded. Only this item is lost.
    Encode { source: PathBuf, reason: String },
    /// The sink takes no more items, e.g. a closed pipe or a reached limit.
    Closed,
    /// Writing to the underlying stream failed.
    Write(std::io::Error),
}

impl SinkError {
    /// True when the sink cannot take any further item.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Encode { .. })
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode { source, reason } => {
                write!(f, "Cannot encode {}: {}", source.display(), reason)
            }
            Self::Closed => write!(f, "Output closed"),
            Self::Write(e) => write!(f, "Failed to write output: {}", e),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Write(e) => Some(e),
            _ => None,
        }
    }
}

/// Receives the work items of a run.
pub trait WorkItemSink {
    /// Consumes one item.
    ///
    /// `Ok` means the item was taken; `Ok(Break)` then ends the whole run.
    /// A non-fatal `Err` skips this item only, a fatal one ends the run.
    fn accept(&mut self, item: WorkItem) -> Result<ControlFlow<()>, SinkError>;

    /// Called for every error; fatal ones end the current root only.
    fn report_error(&mut self, error: &PipelineError) {
        log::warn!("{}", error);
    }
}

impl WorkItemSink for Vec<WorkItem> {
    fn accept(&mut self, item: WorkItem) -> Result<ControlFlow<()>, SinkError> {
        self.push(item);
        Ok(ControlFlow::Continue(()))
    }
}

/// How each root's pipeline is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PipelineMode {
    /// Walker on a background thread, bounded handoff queue.
    #[default]
    Threaded,
    /// Walker and router on the calling thread.
    SingleThread,
}

/// Totals of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Items accepted by the sink, per category.
    pub per_category: BTreeMap<String, usize>,
    /// Roots whose pipeline ended with a walk error.
    pub failed_roots: Vec<PathBuf>,
    /// Files that could not be routed or were refused by the sink.
    pub item_errors: usize,
    /// The sink asked to stop before all roots were drained.
    pub stopped_early: bool,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.per_category.values().sum()
    }
}

/// Runs one pipeline per root, in order, feeding `sink`.
///
/// # Examples
///
/// ```no_run
/// use mimeroute::pipeline::{PipelineContext, PipelineMode, run_all};
/// use mimeroute::router::{CategoryMap, SourceRoot, WorkItem};
///
/// let categories: CategoryMap = [("image", "/photos")].into_iter().collect();
/// let ctx = PipelineContext::new(categories);
/// let roots = vec![SourceRoot::new("/import").unwrap()];
///
/// let mut items: Vec<WorkItem> = Vec::new();
/// let summary = run_all(&ctx, &roots, &mut items, PipelineMode::Threaded);
/// assert_eq!(summary.total(), items.len());
/// ```
pub fn run_all<S: WorkItemSink + ?Sized>(
    ctx: &PipelineContext,
    roots: &[SourceRoot],
    sink: &mut S,
    mode: PipelineMode,
) -> RunSummary {
    let mut summary = RunSummary::default();
    for root in roots {
        log::debug!("Processing source {}", root.path().display());
        let flow = match mode {
            PipelineMode::Threaded => {
                drain(Pipeline::spawn(ctx, root), root, sink, &mut summary)
            }
            PipelineMode::SingleThread => {
                drain(Pipeline::iter_sync(ctx, root), root, sink, &mut summary)
            }
        };
        if flow.is_break() {
            summary.stopped_early = true;
            break;
        }
    }
    summary
}

fn drain<I, S>(
    items: I,
    root: &SourceRoot,
    sink: &mut S,
    summary: &mut RunSummary,
) -> ControlFlow<()>
where
    I: Iterator<Item = StreamItem>,
    S: WorkItemSink + ?Sized,
{
    for result in items {
        match result {
            Ok(item) => {
                let category = item.category.clone();
                match sink.accept(item) {
                    Ok(flow) => {
                        *summary.per_category.entry(category).or_insert(0) += 1;
                        flow?;
                    }
                    Err(SinkError::Closed) => return ControlFlow::Break(()),
                    Err(e) => {
                        let fatal = e.is_fatal();
                        sink.report_error(&e.into());
                        if fatal {
                            return ControlFlow::Break(());
                        }
                        summary.item_errors += 1;
                    }
                }
            }
            Err(e) => {
                sink.report_error(&e);
                if e.is_fatal() {
                    summary.failed_roots.push(root.path().to_path_buf());
                    break;
                }
                summary.item_errors += 1;
            }
        }
    }
    ControlFlow::Continue(())
}
