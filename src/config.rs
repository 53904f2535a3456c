//! Configuration loading, path filters and run-plan validation.
//!
//! Configuration comes from an optional TOML file merged with command-line
//! arguments. Everything is validated up front by [`RunPlan::build`]: once a
//! plan exists, every source root and destination is a directory that existed
//! at validation time, and the pipeline never sees a configuration error.
//!
//! # Configuration File Format
//!
//! ```toml
//! sources = ["~/import"]
//! channel_capacity = 64
//! mime_types_file = "/etc/mime.types"
//!
//! [destinations]
//! image = "~/photos"
//! video = "~/videos"
//!
//! [extensions]
//! cr2 = "image/x-canon-cr2"
//!
//! [filters]
//! skip_hidden = false
//! exclude_patterns = ["**/.thumbnails/**"]
//! exclude_regex = []
//! ```

use crate::mime_table::MimeTable;
use crate::pipeline::PipelineContext;
use crate::router::{CategoryMap, SourceRoot};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Default capacity of the walker-to-router handoff queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Errors detected while loading or validating configuration.
///
/// All of these are fatal to the run and are reported before any traversal starts.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    ConfigInvalid(String),
    /// IO error while reading configuration.
    IoError(String),
    /// Invalid glob pattern provided.
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// No source directory was given.
    NoSources,
    /// No category destination was given.
    NoDestinations,
    /// A destination mapping not of the form `type=dir`.
    InvalidMapping(String),
    /// A configured path could not be accessed.
    PathNotFound { path: PathBuf, reason: String },
    /// A configured path exists but is not a directory.
    NotADirectory(PathBuf),
    /// A custom extension mapping was rejected.
    InvalidExtension { ext: String, reason: String },
    /// The configured `mime.types` file could not be loaded.
    MimeTypesFile(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
            ConfigError::InvalidGlobPattern(pattern) => {
                write!(f, "Invalid glob pattern '{}'", pattern)
            }
            ConfigError::InvalidRegexPattern { pattern, reason } => {
                write!(f, "Invalid regex pattern '{}': {}", pattern, reason)
            }
            ConfigError::NoSources => write!(f, "No sources specified"),
            ConfigError::NoDestinations => write!(f, "No destinations specified"),
            ConfigError::InvalidMapping(mapping) => write!(
                f,
                "Invalid destination mapping '{}': expected TYPE=DIR",
                mapping
            ),
            ConfigError::PathNotFound { path, reason } => {
                write!(f, "{}: {}", path.display(), reason)
            }
            ConfigError::NotADirectory(path) => {
                write!(f, "{} is not a directory", path.display())
            }
            ConfigError::InvalidExtension { ext, reason } => {
                write!(f, "Invalid extension mapping for '{}': {}", ext, reason)
            }
            ConfigError::MimeTypesFile(msg) => write!(f, "Cannot load MIME types: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Checks that `path` exists and is a directory.
pub fn validate_dir(path: &Path) -> Result<(), ConfigError> {
    let metadata = fs::metadata(path).map_err(|e| ConfigError::PathNotFound {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !metadata.is_dir() {
        return Err(ConfigError::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

/// Expands a leading `~` to `$HOME`. Other paths are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME");
    match (path, home) {
        ("~", Some(home)) => PathBuf::from(home),
        (p, Some(home)) if p.starts_with("~/") => PathBuf::from(home).join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

/// Contents of a configuration file, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Source directories to scan.
    pub sources: Vec<String>,
    /// Category (top-level MIME type) to destination directory.
    pub destinations: BTreeMap<String, String>,
    /// Extra extension to MIME type mappings, overriding the built-in table.
    pub extensions: BTreeMap<String, String>,
    /// Optional `mime.types` file merged into the built-in table.
    pub mime_types_file: Option<String>,
    /// Capacity of the walker handoff queue.
    pub channel_capacity: Option<usize>,
    /// Rules for skipping files during traversal.
    pub filters: FilterRules,
    /// Source directories from the command line, used as given.
    #[serde(skip)]
    pub cli_sources: Vec<PathBuf>,
}

impl ConfigFile {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.mimerouterc.toml` in the current directory
    /// 3. Look for `~/.config/mimeroute/config.toml` in home directory
    /// 4. Fall back to an empty configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any discovered file fails to parse.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".mimerouterc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("mimeroute")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        log::debug!("Loaded configuration from {}", path.display());

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Merges command-line arguments into this configuration.
    ///
    /// Sources are appended after the file's sources and kept as raw paths, so
    /// names that are not valid UTF-8 survive. Each mapping has the form
    /// `TYPE=DIR` and replaces any destination the file configured for the same type.
    pub fn merge_cli(
        &mut self,
        sources: &[PathBuf],
        mappings: &[String],
    ) -> Result<(), ConfigError> {
        self.cli_sources.extend_from_slice(sources);
        for mapping in mappings {
            let (category, dir) = CategoryMap::parse_mapping(mapping)?;
            self.destinations
                .insert(category, dir.to_string_lossy().into_owned());
        }
        Ok(())
    }
}

/// Rules for skipping files during traversal.
///
/// Patterns and `skip_hidden` apply to the path relative to its source root;
/// regexes apply to the file name. With the defaults nothing is skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterRules {
    /// Skip files with a hidden (dot-prefixed) file name or parent directory.
    pub skip_hidden: bool,
    /// Glob patterns to exclude (e.g., "*.tmp", "**/.thumbnails/**").
    pub exclude_patterns: Vec<String>,
    /// Regex patterns matched against the file name.
    pub exclude_regex: Vec<String>,
}

impl FilterRules {
    /// Compile the rules into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex pattern is invalid.
    pub fn compile(self) -> Result<PathFilters, ConfigError> {
        let exclude_patterns = self
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_regexes = self
            .exclude_regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PathFilters {
            skip_hidden: self.skip_hidden,
            exclude_patterns,
            exclude_regexes,
        })
    }
}

/// Compiled filter rules. The default value matches nothing.
#[derive(Debug, Clone, Default)]
pub struct PathFilters {
    skip_hidden: bool,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
}

impl PathFilters {
    /// Returns false if `relative_path` is excluded by any rule.
    pub fn should_include(&self, relative_path: &Path) -> bool {
        if self.skip_hidden && is_hidden(relative_path) {
            return false;
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return false;
        }

        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }

    /// True when no rule is configured.
    pub fn is_empty(&self) -> bool {
        !self.skip_hidden && self.exclude_patterns.is_empty() && self.exclude_regexes.is_empty()
    }
}

fn is_hidden(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// A fully validated run: source roots plus the immutable pipeline context.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub sources: Vec<SourceRoot>,
    pub context: PipelineContext,
}

impl RunPlan {
    /// Validates a configuration into a runnable plan.
    ///
    /// # Errors
    ///
    /// Fails on an empty source list or destination map, on any source or
    /// destination that is not an existing directory, and on invalid
    /// extension mappings or filter patterns.
    pub fn build(config: ConfigFile) -> Result<Self, ConfigError> {
        if config.sources.is_empty() && config.cli_sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        if config.destinations.is_empty() {
            return Err(ConfigError::NoDestinations);
        }

        let sources = config
            .sources
            .iter()
            .map(|s| expand_home(s))
            .chain(config.cli_sources.iter().cloned())
            .map(SourceRoot::new)
            .collect::<Result<Vec<_>, _>>()?;

        let mut categories = CategoryMap::new();
        for (category, dir) in &config.destinations {
            categories.insert(category, expand_home(dir));
        }
        categories.validate()?;

        let mut mime_table = MimeTable::standard();
        if let Some(file) = &config.mime_types_file {
            let added = mime_table
                .load_mime_types(&expand_home(file))
                .map_err(|e| ConfigError::MimeTypesFile(e.to_string()))?;
            log::debug!("Merged {} extensions from {}", added, file);
        }
        for (ext, mime) in &config.extensions {
            mime_table
                .insert(ext, mime)
                .map_err(|e| ConfigError::InvalidExtension {
                    ext: ext.clone(),
                    reason: e.to_string(),
                })?;
        }

        let filters = config.filters.compile()?;

        let context = PipelineContext::new(categories)
            .with_mime_table(mime_table)
            .with_filters(Arc::new(filters))
            .with_channel_capacity(
                config
                    .channel_capacity
                    .unwrap_or(DEFAULT_CHANNEL_CAPACITY),
            );

        Ok(Self { sources, context })
    }
}
