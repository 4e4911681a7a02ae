//! Error types for the publisher module.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::anno::AnnotationError;
use crate::dataset::ManifestError;
use crate::error::ErrorCategory;

/// Result type for publisher operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Errors that can occur while building a dataset.
#[derive(Debug)]
pub enum PublishError {
    /// The source root does not exist or is not a directory.
    InvalidSource(PathBuf),

    /// A class directory name is not lowercase letters and underscores.
    InvalidClassName(PathBuf),

    /// A video directory name cannot be used as an item id.
    InvalidItemId(PathBuf),

    /// The dataset version is not of the form `[v]MAJOR.MINOR`.
    InvalidVersion(String),

    /// The test split list is missing from the source root.
    MissingTestSplit(PathBuf),

    /// The test split list contains no keys.
    EmptyTestSplit(PathBuf),

    /// Failed to create directory.
    CreateDirectoryFailed { path: PathBuf, source: io::Error },

    /// Failed to read file or directory.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write file.
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to remove file or directory.
    RemoveFailed { path: PathBuf, source: io::Error },

    /// The zip container could not be written.
    ArchiveFailed {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    /// A video has no build marker after the packaging pass.
    MissingMarker {
        class: String,
        item_id: String,
        directory: PathBuf,
    },

    /// A video's annotation could not be loaded.
    AnnotationFailed { path: PathBuf, source: AnnotationError },

    /// The manifest could not be written.
    Manifest(ManifestError),

    /// The packaging worker pool could not be started.
    WorkerPool(String),

    /// One or more videos failed to package.
    PackagingFailed(Vec<ItemFailure>),

    /// The build was interrupted before all videos were packaged.
    Cancelled { remaining: usize },
}

impl PublishError {
    /// Classify the error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            PublishError::InvalidSource(_)
            | PublishError::InvalidClassName(_)
            | PublishError::InvalidItemId(_)
            | PublishError::InvalidVersion(_)
            | PublishError::MissingTestSplit(_)
            | PublishError::EmptyTestSplit(_)
            | PublishError::AnnotationFailed { .. } => ErrorCategory::Validation,
            PublishError::MissingMarker { .. } => ErrorCategory::Consistency,
            PublishError::Cancelled { .. } => ErrorCategory::Cancelled,
            PublishError::CreateDirectoryFailed { .. }
            | PublishError::ReadFailed { .. }
            | PublishError::WriteFailed { .. }
            | PublishError::RemoveFailed { .. }
            | PublishError::ArchiveFailed { .. }
            | PublishError::Manifest(_)
            | PublishError::WorkerPool(_)
            | PublishError::PackagingFailed(_) => ErrorCategory::Io,
        }
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::InvalidSource(path) => {
                write!(f, "source directory not found: {}", path.display())
            }
            PublishError::InvalidClassName(path) => {
                write!(
                    f,
                    "invalid class name (lowercase letters and underscores only): {}",
                    path.display()
                )
            }
            PublishError::InvalidItemId(path) => {
                write!(f, "invalid video directory name: {}", path.display())
            }
            PublishError::InvalidVersion(version) => {
                write!(f, "invalid version '{}': expected e.g. 1.0 or v1.0", version)
            }
            PublishError::MissingTestSplit(path) => {
                write!(f, "test split list not found: {}", path.display())
            }
            PublishError::EmptyTestSplit(path) => {
                write!(f, "test split list is empty: {}", path.display())
            }
            PublishError::CreateDirectoryFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            PublishError::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            PublishError::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            PublishError::RemoveFailed { path, source } => {
                write!(f, "failed to remove {}: {}", path.display(), source)
            }
            PublishError::ArchiveFailed { path, source } => {
                write!(f, "failed to write archive {}: {}", path.display(), source)
            }
            PublishError::MissingMarker {
                class,
                item_id,
                directory,
            } => {
                write!(
                    f,
                    "no build marker for {}/{} in {}",
                    class,
                    item_id,
                    directory.display()
                )
            }
            PublishError::AnnotationFailed { path, source } => {
                write!(
                    f,
                    "failed to load annotation for {}: {}",
                    path.display(),
                    source
                )
            }
            PublishError::Manifest(e) => write!(f, "{}", e),
            PublishError::WorkerPool(msg) => {
                write!(f, "failed to start packaging workers: {}", msg)
            }
            PublishError::PackagingFailed(failures) => {
                write!(f, "{} video(s) failed to package", failures.len())?;
                if let Some(first) = failures.first() {
                    write!(f, " (first: {})", first)?;
                }
                Ok(())
            }
            PublishError::Cancelled { remaining } => {
                write!(f, "build cancelled with {} video(s) remaining", remaining)
            }
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::CreateDirectoryFailed { source, .. } => Some(source),
            PublishError::ReadFailed { source, .. } => Some(source),
            PublishError::WriteFailed { source, .. } => Some(source),
            PublishError::RemoveFailed { source, .. } => Some(source),
            PublishError::ArchiveFailed { source, .. } => Some(source),
            PublishError::AnnotationFailed { source, .. } => Some(source),
            PublishError::Manifest(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ManifestError> for PublishError {
    fn from(e: ManifestError) -> Self {
        PublishError::Manifest(e)
    }
}

/// A video that failed during the packaging pass.
#[derive(Debug)]
pub struct ItemFailure {
    pub class: String,
    pub item_id: String,
    pub error: PublishError,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.class, self.item_id, self.error)
    }
}
