//! Classification of discovered files and destination path computation.
//!
//! The router resolves a file's MIME type from its extension, takes the
//! top-level type as the file's category and, when that category has a
//! configured destination, maps the file's path below its source root onto the
//! destination root.

use crate::config::{ConfigError, validate_dir};
use crate::mime_table::{MimeTable, top_level_category};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A validated source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRoot {
    path: PathBuf,
}

impl SourceRoot {
    /// Validates that `path` is an existing directory and makes it absolute.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        validate_dir(path)?;
        let path = std::path::absolute(path).map_err(|e| ConfigError::PathNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Category name (top-level MIME type) to destination root.
#[derive(Debug, Clone, Default)]
pub struct CategoryMap {
    destinations: HashMap<String, PathBuf>,
}

impl CategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits a `TYPE=DIR` mapping on its first `=`.
    ///
    /// # Examples
    ///
    /// ```
    /// use mimeroute::router::CategoryMap;
    /// use std::path::PathBuf;
    ///
    /// let (category, dir) = CategoryMap::parse_mapping("image=/photos").unwrap();
    /// assert_eq!(category, "image");
    /// assert_eq!(dir, PathBuf::from("/photos"));
    /// assert!(CategoryMap::parse_mapping("image").is_err());
    /// ```
    pub fn parse_mapping(mapping: &str) -> Result<(String, PathBuf), ConfigError> {
        match mapping.split_once('=') {
            Some((category, dir)) if !category.is_empty() && !dir.is_empty() => {
                Ok((category.to_string(), PathBuf::from(dir)))
            }
            _ => Err(ConfigError::InvalidMapping(mapping.to_string())),
        }
    }

    /// Sets the destination for a category, replacing any previous one.
    ///
    /// The destination is not checked here; see [`CategoryMap::validate`].
    pub fn insert(&mut self, category: impl Into<String>, destination: impl Into<PathBuf>) {
        self.destinations
            .insert(category.into(), destination.into());
    }

    /// Checks that every destination is an existing directory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (_, destination) in self.iter() {
            validate_dir(destination)?;
        }
        Ok(())
    }

    pub fn get(&self, category: &str) -> Option<&Path> {
        self.destinations.get(category).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Iterates over `(category, destination)` pairs sorted by category.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        let mut entries: Vec<_> = self
            .destinations
            .iter()
            .map(|(category, dest)| (category.as_str(), dest.as_path()))
            .collect();
        entries.sort_by_key(|&(category, _)| category);
        entries.into_iter()
    }
}

impl<C: Into<String>, P: Into<PathBuf>> FromIterator<(C, P)> for CategoryMap {
    fn from_iter<I: IntoIterator<Item = (C, P)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (category, destination) in iter {
            map.insert(category, destination);
        }
        map
    }
}

/// A file paired with the path it routes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkItem {
    /// Absolute path of the discovered file.
    pub source: PathBuf,
    /// Destination root joined with the file's path relative to its source root.
    pub destination: PathBuf,
    /// Top-level MIME type that selected the destination.
    pub category: String,
    /// Full MIME type resolved from the extension.
    pub mime_type: String,
}

/// Errors raised while routing a single file.
#[derive(Debug)]
pub enum RouteError {
    /// The file does not live under the source root it was reported for.
    NotUnderRoot { path: PathBuf, root: PathBuf },
}

impl std::fmt::Display for RouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotUnderRoot { path, root } => write!(
                f,
                "Error finding relative path of {} under {}",
                path.display(),
                root.display()
            ),
        }
    }
}

impl std::error::Error for RouteError {}

/// Maps discovered files to work items.
///
/// Routing is pure path computation: nothing is read from or written to disk.
#[derive(Debug, Clone, Copy)]
pub struct Router<'a> {
    categories: &'a CategoryMap,
    mime_table: &'a MimeTable,
}

impl<'a> Router<'a> {
    pub fn new(categories: &'a CategoryMap, mime_table: &'a MimeTable) -> Self {
        Self {
            categories,
            mime_table,
        }
    }

    /// Routes `path`, found under `root`.
    ///
    /// Returns `Ok(None)` when the extension has no MIME type or the category
    /// has no destination. Unroutable files are expected, not errors.
    ///
    /// # Examples
    ///
    /// ```
    /// use mimeroute::mime_table::MimeTable;
    /// use mimeroute::router::{CategoryMap, Router};
    /// use std::path::Path;
    ///
    /// let categories: CategoryMap = [("video", "/videos")].into_iter().collect();
    /// let table = MimeTable::standard();
    /// let router = Router::new(&categories, &table);
    ///
    /// let item = router
    ///     .route(Path::new("/import"), Path::new("/import/sub/b.mp4"))
    ///     .unwrap()
    ///     .unwrap();
    /// assert_eq!(item.destination, Path::new("/videos/sub/b.mp4"));
    ///
    /// let skipped = router.route(Path::new("/import"), Path::new("/import/a.jpg")).unwrap();
    /// assert!(skipped.is_none());
    /// ```
    pub fn route(&self, root: &Path, path: &Path) -> Result<Option<WorkItem>, RouteError> {
        let Some(mime_type) = self.mime_table.mime_for_path(path) else {
            return Ok(None);
        };
        let category = top_level_category(mime_type);
        let Some(destination_root) = self.categories.get(category) else {
            return Ok(None);
        };

        let relative = path
            .strip_prefix(root)
            .map_err(|_| RouteError::NotUnderRoot {
                path: path.to_path_buf(),
                root: root.to_path_buf(),
            })?;

        Ok(Some(WorkItem {
            source: path.to_path_buf(),
            destination: destination_root.join(relative),
            category: category.to_string(),
            mime_type: mime_type.to_string(),
        }))
    }
}
