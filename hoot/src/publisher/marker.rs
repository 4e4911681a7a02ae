//! Build markers: zero-byte files whose names record a packaged video.
//!
//! ```text
//! .hoot.{class}.{video}.{sha256}.{size}
//! .hoot.{video}.{sha256}.{size}          (older trees, no class segment)
//! ```
//!
//! A marker is created only after its archive has been renamed into place,
//! so a directory listing is the full resumability index: a video with a
//! marker is done, a video without one is packaged again.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use super::{PublishError, PublishResult};

/// Leading component shared by every marker name.
pub const MARKER_PREFIX: &str = ".hoot.";

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\.hoot\.(?:([a-z_]+)\.)?([A-Za-z0-9_-]+)\.([0-9a-f]{64})\.(\d+)$").unwrap()
    })
}

/// Decoded contents of a marker name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMarker {
    /// Class segment; `None` for class-free markers.
    pub class: Option<String>,
    pub item_id: String,
    pub content_hash: String,
    pub uncompressed_size: u64,
}

impl BuildMarker {
    /// Create a class-qualified marker.
    pub fn new(
        class: impl Into<String>,
        item_id: impl Into<String>,
        content_hash: impl Into<String>,
        uncompressed_size: u64,
    ) -> Self {
        Self {
            class: Some(class.into()),
            item_id: item_id.into(),
            content_hash: content_hash.into(),
            uncompressed_size,
        }
    }

    /// Encode the marker as a file name.
    pub fn file_name(&self) -> String {
        match &self.class {
            Some(class) => format!(
                "{}{}.{}.{}.{}",
                MARKER_PREFIX, class, self.item_id, self.content_hash, self.uncompressed_size
            ),
            None => format!(
                "{}{}.{}.{}",
                MARKER_PREFIX, self.item_id, self.content_hash, self.uncompressed_size
            ),
        }
    }

    /// Decode a file name.
    ///
    /// Returns `None` for anything that is not a well-formed marker,
    /// including sizes that do not fit in a `u64`.
    pub fn parse(name: &str) -> Option<Self> {
        let caps = marker_pattern().captures(name)?;
        Some(Self {
            class: caps.get(1).map(|m| m.as_str().to_string()),
            item_id: caps[2].to_string(),
            content_hash: caps[3].to_string(),
            uncompressed_size: caps[4].parse().ok()?,
        })
    }

    /// Whether this marker records `class`/`item_id`.
    ///
    /// Class-free markers match on the video id alone; they are only ever
    /// looked up inside their class directory.
    pub fn matches(&self, class: &str, item_id: &str) -> bool {
        self.item_id == item_id && self.class.as_deref().map_or(true, |c| c == class)
    }
}

/// Names of all marker-like entries in `dir`, sorted.
///
/// A missing directory has no markers.
pub fn list_markers(dir: &Path) -> PublishResult<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(PublishError::ReadFailed {
                path: dir.to_path_buf(),
                source: e,
            })
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PublishError::ReadFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(MARKER_PREFIX) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Find the marker for `class`/`item_id` among `names`.
///
/// Malformed names are ignored. When several markers match, the first in
/// lexicographic order wins and a warning is logged.
pub fn find_marker(class: &str, item_id: &str, names: &[String]) -> Option<BuildMarker> {
    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort();

    let mut matching = sorted
        .into_iter()
        .filter_map(|name| BuildMarker::parse(name))
        .filter(|m| m.matches(class, item_id));

    let first = matching.next()?;
    let extra = matching.count();
    if extra > 0 {
        warn!(
            class = %class,
            item = %item_id,
            duplicates = extra,
            marker = %first.file_name(),
            "Multiple build markers found, using the first"
        );
    }
    Some(first)
}

/// Create the marker file in `dir`.
///
/// Uses create-new semantics; an identical marker that already exists is
/// accepted, so two workers racing on the same video cannot corrupt state.
pub fn write_marker(dir: &Path, marker: &BuildMarker) -> PublishResult<PathBuf> {
    let path = dir.join(marker.file_name());
    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(_) => Ok(path),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(e) => Err(PublishError::WriteFailed { path, source: e }),
    }
}
