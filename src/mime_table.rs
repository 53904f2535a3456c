//! Extension to MIME type resolution.
//!
//! This module maps file name extensions to MIME types using a static table of
//! well-known types, optionally extended with custom mappings or a system
//! `mime.types` file. The top-level part of a MIME type (`image` in `image/png`)
//! is what the router uses as a file's category.
//!
//! # Examples
//!
//! ```
//! use mimeroute::mime_table::{MimeTable, top_level_category};
//!
//! let table = MimeTable::standard();
//! assert_eq!(table.lookup("png"), Some("image/png"));
//! assert_eq!(table.lookup("JPG"), Some("image/jpeg"));
//! assert_eq!(top_level_category("audio/mpeg"), "audio");
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Built-in extension table. Extensions are lower-case and carry no leading dot.
const STANDARD_TYPES: &[(&str, &str)] = &[
    // Images
    ("avif", "image/avif"),
    ("bmp", "image/bmp"),
    ("gif", "image/gif"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("ico", "image/vnd.microsoft.icon"),
    ("jpe", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("webp", "image/webp"),
    // Audio
    ("aac", "audio/aac"),
    ("flac", "audio/flac"),
    ("m4a", "audio/mp4"),
    ("mid", "audio/midi"),
    ("midi", "audio/midi"),
    ("mp3", "audio/mpeg"),
    ("oga", "audio/ogg"),
    ("ogg", "audio/ogg"),
    ("opus", "audio/opus"),
    ("wav", "audio/wav"),
    ("weba", "audio/webm"),
    ("wma", "audio/x-ms-wma"),
    // Video
    ("3gp", "video/3gpp"),
    ("avi", "video/x-msvideo"),
    ("flv", "video/x-flv"),
    ("m4v", "video/mp4"),
    ("mkv", "video/x-matroska"),
    ("mov", "video/quicktime"),
    ("mp4", "video/mp4"),
    ("mpeg", "video/mpeg"),
    ("mpg", "video/mpeg"),
    ("ogv", "video/ogg"),
    ("webm", "video/webm"),
    ("wmv", "video/x-ms-wmv"),
    // Text
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ics", "text/calendar"),
    ("js", "text/javascript"),
    ("md", "text/markdown"),
    ("mjs", "text/javascript"),
    ("txt", "text/plain"),
    ("xml", "text/xml"),
    // Application
    ("7z", "application/x-7z-compressed"),
    ("bz2", "application/x-bzip2"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("epub", "application/epub+zip"),
    ("gz", "application/gzip"),
    ("json", "application/json"),
    ("odp", "application/vnd.oasis.opendocument.presentation"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("pdf", "application/pdf"),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("rar", "application/vnd.rar"),
    ("rtf", "application/rtf"),
    ("tar", "application/x-tar"),
    ("wasm", "application/wasm"),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("xz", "application/x-xz"),
    ("zip", "application/zip"),
    // Fonts
    ("otf", "font/otf"),
    ("ttf", "font/ttf"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
];

/// Errors raised while extending a [`MimeTable`].
#[derive(Debug)]
pub enum MimeTableError {
    /// A MIME type string that is not of the form `type/subtype`.
    InvalidMimeType { mime: String },
    /// An empty extension.
    EmptyExtension,
    /// A `mime.types` file could not be read.
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for MimeTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMimeType { mime } => {
                write!(f, "Invalid MIME type '{}': expected type/subtype", mime)
            }
            Self::EmptyExtension => write!(f, "Extension must not be empty"),
            Self::ReadFailed { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for MimeTableError {}

/// Maps file extensions to MIME types.
#[derive(Debug, Clone)]
pub struct MimeTable {
    types: HashMap<String, String>,
}

impl MimeTable {
    /// Creates an empty table.
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Creates a table populated with the built-in extension mappings.
    pub fn standard() -> Self {
        let types = STANDARD_TYPES
            .iter()
            .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
            .collect();
        Self { types }
    }

    /// Adds or replaces the mapping for `ext`.
    ///
    /// The extension is stored lower-cased, without a leading dot. The MIME type
    /// must contain exactly one `/` with a non-empty type on each side.
    ///
    /// # Examples
    ///
    /// ```
    /// use mimeroute::mime_table::MimeTable;
    ///
    /// let mut table = MimeTable::standard();
    /// table.insert(".CR2", "image/x-canon-cr2").unwrap();
    /// assert_eq!(table.lookup("cr2"), Some("image/x-canon-cr2"));
    /// assert!(table.insert("bad", "nosubtype").is_err());
    /// ```
    pub fn insert(&mut self, ext: &str, mime: &str) -> Result<(), MimeTableError> {
        let ext = normalize_extension(ext);
        if ext.is_empty() {
            return Err(MimeTableError::EmptyExtension);
        }
        if !is_valid_mime(mime) {
            return Err(MimeTableError::InvalidMimeType {
                mime: mime.to_string(),
            });
        }
        self.types.insert(ext.to_ascii_lowercase(), mime.to_string());
        Ok(())
    }

    /// Merges a system `mime.types` file into this table.
    ///
    /// Each line has the form `type/subtype ext1 ext2 ...`; `#` starts a comment.
    /// Malformed lines are skipped. Returns the number of extensions added.
    pub fn load_mime_types(&mut self, path: &Path) -> Result<usize, MimeTableError> {
        let content = fs::read_to_string(path).map_err(|e| MimeTableError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(self.merge_mime_types(&content))
    }

    fn merge_mime_types(&mut self, content: &str) -> usize {
        let mut added = 0;
        for (line_no, line) in content.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default();
            let mut fields = line.split_whitespace();
            let Some(mime) = fields.next() else {
                continue;
            };
            if !is_valid_mime(mime) {
                log::debug!("mime.types line {}: skipping '{}'", line_no + 1, mime);
                continue;
            }
            for ext in fields {
                if self.insert(ext, mime).is_ok() {
                    added += 1;
                }
            }
        }
        added
    }

    /// Looks up the MIME type registered for an extension.
    ///
    /// The extension is tried exactly as given first, then ASCII lower-cased.
    /// A leading dot is ignored.
    pub fn lookup(&self, ext: &str) -> Option<&str> {
        let ext = normalize_extension(ext);
        if ext.is_empty() {
            return None;
        }
        self.types
            .get(ext)
            .or_else(|| self.types.get(&ext.to_ascii_lowercase()))
            .map(String::as_str)
    }

    /// Resolves the MIME type for a path from its extension.
    ///
    /// # Examples
    ///
    /// ```
    /// use mimeroute::mime_table::MimeTable;
    /// use std::path::Path;
    ///
    /// let table = MimeTable::standard();
    /// assert_eq!(table.mime_for_path(Path::new("/import/doc.pdf")), Some("application/pdf"));
    /// assert_eq!(table.mime_for_path(Path::new("/import/README")), None);
    /// ```
    pub fn mime_for_path(&self, path: &Path) -> Option<&str> {
        let ext = path.extension()?.to_str()?;
        self.lookup(ext)
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for MimeTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Returns the top-level type of a MIME string, the part before the first `/`.
pub fn top_level_category(mime: &str) -> &str {
    mime.split_once('/').map_or(mime, |(major, _)| major)
}

fn normalize_extension(ext: &str) -> &str {
    ext.strip_prefix('.').unwrap_or(ext)
}

fn is_valid_mime(mime: &str) -> bool {
    match mime.split_once('/') {
        Some((major, minor)) => !major.is_empty() && !minor.is_empty() && !minor.contains('/'),
        None => false,
    }
}
