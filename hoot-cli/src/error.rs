//! CLI error type.

use hoot::config::ConfigError;
use hoot::dataset::ManifestError;
use hoot::logging::LoggingError;
use hoot::publisher::PublishError;
use hoot::retriever::RetrieveError;
use hoot::ErrorCategory;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Retrieve(#[from] RetrieveError),

    #[error("{failed} video(s) failed, {cancelled} not started")]
    DownloadIncomplete { failed: usize, cancelled: usize },

    #[error("{0} archive(s) failed verification")]
    Verification(usize),
}

impl CliError {
    /// Category of the underlying library error, if any.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            CliError::Publish(e) => Some(e.category()),
            CliError::Retrieve(e) => Some(e.category()),
            CliError::Verification(_) => Some(ErrorCategory::Integrity),
            _ => None,
        }
    }

    /// Process exit code.
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            Some(ErrorCategory::Cancelled) => 130,
            _ => 1,
        }
    }
}
