//! Integrity check of a local dataset tree against its manifest.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::manifest::Manifest;
use super::naming::{is_safe_file_name, is_valid_class_name};
use crate::digest::content_hash_of_archive;

/// What is wrong with an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// The manifest path cannot be mapped to a local file.
    InvalidPath,
    /// No archive exists at the expected location.
    Missing,
    /// The archive size differs from `downloadSize`.
    SizeMismatch { expected: u64, actual: u64 },
    /// The archive's content hash differs from `sha256`.
    HashMismatch { expected: String, actual: String },
    /// The archive exists but could not be read as a zip.
    Unreadable(String),
}

/// A manifest entry whose local archive violates the integrity contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveIssue {
    pub class: String,
    pub item_id: String,
    pub path: PathBuf,
    pub kind: IssueKind,
}

impl fmt::Display for ArchiveIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({}): ", self.class, self.item_id, self.path.display())?;
        match &self.kind {
            IssueKind::InvalidPath => write!(f, "invalid archive path"),
            IssueKind::Missing => write!(f, "archive missing"),
            IssueKind::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {}, got {}", expected, actual)
            }
            IssueKind::HashMismatch { expected, actual } => {
                write!(f, "content hash mismatch: expected {}, got {}", expected, actual)
            }
            IssueKind::Unreadable(reason) => write!(f, "unreadable archive: {}", reason),
        }
    }
}

/// Check every archive listed in `manifest` under `root`.
///
/// An archive passes when it exists at `{root}/{class}/{archive name}`, its
/// size equals `downloadSize`, and its recomputed content hash equals
/// `sha256`. Only failing entries are returned.
pub fn verify_archives(manifest: &Manifest, root: &Path) -> Vec<ArchiveIssue> {
    let mut issues = Vec::new();

    for (class, entry) in manifest.entries() {
        let archive_name = entry.archive_name();
        let path = root.join(class).join(archive_name);

        let issue = |kind| ArchiveIssue {
            class: class.to_string(),
            item_id: entry.id.clone(),
            path: path.clone(),
            kind,
        };

        if !is_valid_class_name(class) || !is_safe_file_name(archive_name) {
            issues.push(issue(IssueKind::InvalidPath));
            continue;
        }

        let actual_size = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(_) => {
                issues.push(issue(IssueKind::Missing));
                continue;
            }
        };
        if actual_size != entry.download_size {
            issues.push(issue(IssueKind::SizeMismatch {
                expected: entry.download_size,
                actual: actual_size,
            }));
            continue;
        }

        match content_hash_of_archive(&path) {
            Ok((hash, _)) if hash == entry.content_hash => {
                debug!(class = %class, item = %entry.id, "Archive verified");
            }
            Ok((hash, _)) => issues.push(issue(IssueKind::HashMismatch {
                expected: entry.content_hash.clone(),
                actual: hash,
            })),
            Err(e) => issues.push(issue(IssueKind::Unreadable(e.to_string()))),
        }
    }

    if !issues.is_empty() {
        warn!(issues = issues.len(), "Dataset verification found problems");
    }
    issues
}
