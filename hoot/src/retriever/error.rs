//! Error types for the retriever.

use std::io;
use std::path::PathBuf;

use crate::error::ErrorCategory;

/// Result type for retriever operations.
pub type RetrieveResult<T> = Result<T, RetrieveError>;

/// Errors that can occur while retrieving a dataset.
#[derive(Debug)]
pub enum RetrieveError {
    /// Unknown dataset release identifier.
    InvalidRelease(String),

    /// Base URL is malformed.
    InvalidUrl(String),

    /// The HTTP client could not be created.
    HttpClient(String),

    /// The request could not be completed.
    FetchFailed { url: String, reason: String },

    /// The server answered with a non-success status.
    HttpStatus { url: String, status: u16 },

    /// Network timeout.
    Timeout { url: String, timeout_secs: u64 },

    /// The server returned something other than the expected document type.
    UnexpectedContentType { url: String, content_type: String },

    /// The manifest document could not be parsed.
    ManifestParse { url: String, reason: String },

    /// A manifest entry names a path that cannot be mapped into the local tree.
    InvalidEntryPath { class: String, path: String },

    /// Failed to read a file or directory.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Failed to remove a file.
    RemoveFailed { path: PathBuf, source: io::Error },

    /// Downloaded size differs from the manifest's `downloadSize`.
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Downloaded content hash differs from the manifest's `sha256`.
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The downloaded file is not a readable archive.
    CorruptArchive { path: PathBuf, reason: String },

    /// Archive extraction failed.
    ExtractionFailed { path: PathBuf, reason: String },

    /// The worker handling this item panicked or exited early.
    WorkerPanicked { reason: String },

    /// The run was interrupted before this item started.
    Cancelled,
}

impl RetrieveError {
    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRelease(_)
            | Self::InvalidUrl(_)
            | Self::UnexpectedContentType { .. }
            | Self::ManifestParse { .. }
            | Self::InvalidEntryPath { .. } => ErrorCategory::Validation,
            Self::SizeMismatch { .. } | Self::HashMismatch { .. } | Self::CorruptArchive { .. } => {
                ErrorCategory::Integrity
            }
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::HttpClient(_)
            | Self::FetchFailed { .. }
            | Self::HttpStatus { .. }
            | Self::Timeout { .. }
            | Self::ReadFailed { .. }
            | Self::WriteFailed { .. }
            | Self::CreateDirFailed { .. }
            | Self::RemoveFailed { .. }
            | Self::ExtractionFailed { .. } => ErrorCategory::Io,
            Self::WorkerPanicked { .. } => ErrorCategory::Consistency,
        }
    }
}

impl std::fmt::Display for RetrieveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRelease(name) => {
                write!(f, "unknown release '{}'", name)
            }
            Self::InvalidUrl(url) => write!(f, "invalid URL: {}", url),
            Self::HttpClient(reason) => {
                write!(f, "failed to create HTTP client: {}", reason)
            }
            Self::FetchFailed { url, reason } => {
                write!(f, "failed to fetch {}: {}", url, reason)
            }
            Self::HttpStatus { url, status } => {
                write!(f, "server returned status {} for {}", status, url)
            }
            Self::Timeout { url, timeout_secs } => {
                write!(f, "timed out after {}s fetching {}", timeout_secs, url)
            }
            Self::UnexpectedContentType { url, content_type } => {
                write!(
                    f,
                    "unexpected content type '{}' for {}",
                    content_type, url
                )
            }
            Self::ManifestParse { url, reason } => {
                write!(f, "failed to parse manifest from {}: {}", url, reason)
            }
            Self::InvalidEntryPath { class, path } => {
                write!(f, "invalid archive path '{}' in class {}", path, class)
            }
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::RemoveFailed { path, source } => {
                write!(f, "failed to remove {}: {}", path.display(), source)
            }
            Self::SizeMismatch {
                path,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "size mismatch for {}: expected {} bytes, got {}",
                    path.display(),
                    expected,
                    actual
                )
            }
            Self::HashMismatch {
                path,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "content hash mismatch for {}: expected {}, got {}",
                    path.display(),
                    expected,
                    actual
                )
            }
            Self::CorruptArchive { path, reason } => {
                write!(f, "corrupt archive {}: {}", path.display(), reason)
            }
            Self::ExtractionFailed { path, reason } => {
                write!(f, "failed to extract {}: {}", path.display(), reason)
            }
            Self::WorkerPanicked { reason } => {
                write!(f, "download worker failed: {}", reason)
            }
            Self::Cancelled => write!(f, "download cancelled"),
        }
    }
}

impl std::error::Error for RetrieveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            Self::CreateDirFailed { source, .. } => Some(source),
            Self::RemoveFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
