//! Recursive enumeration of regular files under a source root.
//!
//! [`TreeWalker`] wraps a `walkdir` iterator, yields absolute file paths in
//! depth-first, name-sorted order and swallows per-entry errors. Only a failure
//! to read the root itself is reported to the caller.

use crate::config::PathFilters;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Errors surfaced by the walker. Per-entry errors below the root are never surfaced.
#[derive(Debug)]
pub enum WalkError {
    /// The root could not be read (missing, not a directory, or unreadable).
    RootUnreadable {
        root: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for WalkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootUnreadable { root, source } => {
                write!(f, "Cannot walk {}: {}", root.display(), source)
            }
        }
    }
}

impl std::error::Error for WalkError {}

/// Lazy, finite sequence of regular files under a root directory.
///
/// # Examples
///
/// ```no_run
/// use mimeroute::walker::TreeWalker;
/// use std::path::Path;
///
/// let walker = TreeWalker::new(Path::new("/path/to/import")).unwrap();
/// for path in walker.flatten() {
///     println!("{}", path.display());
/// }
/// ```
pub struct TreeWalker {
    root: PathBuf,
    inner: walkdir::IntoIter,
    filters: Option<Arc<PathFilters>>,
    done: bool,
}

impl TreeWalker {
    /// Starts a walk at `root`.
    ///
    /// The root is made absolute and checked up front, so a missing or
    /// non-directory root fails here instead of yielding nothing.
    pub fn new(root: &Path) -> Result<Self, WalkError> {
        let unreadable = |source| WalkError::RootUnreadable {
            root: root.to_path_buf(),
            source,
        };
        let root = std::path::absolute(root).map_err(unreadable)?;
        let metadata = std::fs::metadata(&root).map_err(unreadable)?;
        if !metadata.is_dir() {
            return Err(unreadable(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                "not a directory",
            )));
        }

        let inner = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        Ok(Self {
            root,
            inner,
            filters: None,
            done: false,
        })
    }

    /// Drops every path matched by `filters`.
    pub fn with_filters(mut self, filters: Arc<PathFilters>) -> Self {
        self.filters = Some(filters);
        self
    }

    /// The absolute root this walker descends from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_filtered(&self, path: &Path) -> bool {
        let Some(filters) = &self.filters else {
            return false;
        };
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        !filters.should_include(relative)
    }
}

impl Iterator for TreeWalker {
    type Item = Result<PathBuf, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    self.done = true;
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop at root"));
                    return Some(Err(WalkError::RootUnreadable {
                        root: self.root.clone(),
                        source,
                    }));
                }
                Err(err) => {
                    log::debug!(
                        "Skipping {}: {}",
                        err.path().map_or_else(
                            || "<unknown>".to_string(),
                            |p| p.display().to_string()
                        ),
                        err
                    );
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if self.is_filtered(&path) {
                log::trace!("Filtered out {}", path.display());
                continue;
            }
            return Some(Ok(path));
        }
    }
}
