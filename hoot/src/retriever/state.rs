//! Per-run download bookkeeping.

use std::fmt;

use super::download::TransferOutcome;
use super::error::RetrieveError;

/// Step of an item's retrieval where a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Streaming the archive into its staging file.
    Fetch,
    /// Checking size and content hash of the staged file.
    Verify,
    /// Renaming the staged file to its canonical name.
    Promote,
    /// Unpacking the archive.
    Extract,
    /// Removing the archive after extraction.
    Cleanup,
    /// The worker running the item stopped without a result.
    Worker,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Verify => "verify",
            Stage::Promote => "promote",
            Stage::Extract => "extract",
            Stage::Cleanup => "cleanup",
            Stage::Worker => "worker",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A video that could not be retrieved in this run.
#[derive(Debug)]
pub struct ItemFailure {
    pub class: String,
    pub item_id: String,
    pub stage: Stage,
    pub error: RetrieveError,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({}): {}",
            self.class, self.item_id, self.stage, self.error
        )
    }
}

/// What happened to one selected video.
#[derive(Debug)]
pub enum ItemResult {
    /// The archive is present locally (and unpacked, if requested).
    Done {
        transfer: TransferOutcome,
        extracted: bool,
    },
    Failed(ItemFailure),
    /// Not started because the run was cancelled.
    Cancelled,
}

/// Summary of a download run.
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Videos chosen by the selector.
    pub selected: usize,
    /// Videos transferred and promoted in this run.
    pub downloaded: usize,
    /// Videos whose canonical archive already existed.
    pub skipped: usize,
    /// Videos unpacked in this run.
    pub extracted: usize,
    /// Bytes transferred in this run.
    pub bytes_downloaded: u64,
    /// Videos not started because the run was cancelled.
    pub cancelled: usize,
    pub failures: Vec<ItemFailure>,
}

impl DownloadReport {
    pub fn new(selected: usize) -> Self {
        Self {
            selected,
            ..Self::default()
        }
    }

    /// Every selected video is present locally.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.cancelled == 0
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn record_failure(&mut self, failure: ItemFailure) {
        self.failures.push(failure);
    }

    /// Fold one item's result into the report.
    pub fn record(&mut self, result: ItemResult) {
        match result {
            ItemResult::Done {
                transfer,
                extracted,
            } => {
                match transfer {
                    TransferOutcome::Downloaded { bytes } => {
                        self.downloaded += 1;
                        self.bytes_downloaded += bytes;
                    }
                    TransferOutcome::Skipped => self.skipped += 1,
                }
                if extracted {
                    self.extracted += 1;
                }
            }
            ItemResult::Failed(failure) => self.record_failure(failure),
            ItemResult::Cancelled => self.cancelled += 1,
        }
    }
}
