//! Error taxonomy shared by the build and retrieval pipelines.

use std::fmt;

/// Broad classification of a failure.
///
/// Both [`PublishError`](crate::publisher::PublishError) and
/// [`RetrieveError`](crate::retriever::RetrieveError) map each variant onto
/// one of these so callers can decide whether to abort the run or retry the
/// item later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad input: invalid class name, malformed version, missing required file.
    Validation,
    /// Read, write or network failure on a single item.
    Io,
    /// Downloaded size or content hash disagrees with the manifest.
    Integrity,
    /// The destination tree changed underneath the build.
    Consistency,
    /// The run was interrupted by the user.
    Cancelled,
}

impl ErrorCategory {
    /// Whether an error of this category aborts the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Validation | Self::Consistency)
    }

    /// Short lowercase name used in log fields and CLI output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Io => "io",
            Self::Integrity => "integrity",
            Self::Consistency => "consistency",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_categories() {
        assert!(ErrorCategory::Validation.is_fatal());
        assert!(ErrorCategory::Consistency.is_fatal());
        assert!(!ErrorCategory::Io.is_fatal());
        assert!(!ErrorCategory::Integrity.is_fatal());
        assert!(!ErrorCategory::Cancelled.is_fatal());
    }

    #[test]
    fn test_display_uses_name() {
        assert_eq!(ErrorCategory::Integrity.to_string(), "integrity");
    }
}
