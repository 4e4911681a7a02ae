//! Dataset retriever: fetches the manifest and downloads selected archives.
//!
//! # Architecture
//!
//! ```text
//! Retriever
//!     │
//!     ├── Transport (trait)
//!     │       ├── HttpTransport
//!     │       └── FileTransport
//!     │
//!     ├── Selector (which videos)
//!     │
//!     ├── DownloadStrategy (trait)
//!     │       ├── SequentialStrategy
//!     │       └── ParallelStrategy
//!     │
//!     ├── transfer (stage, verify, promote one archive)
//!     │
//!     └── ArchiveExtractor (unpack into {class}/{video}/)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use hoot::retriever::{DownloadOptions, Release, Retriever, Selector, DEFAULT_HOST};
//!
//! let release = Release::parse("v1_0-HD")?;
//! let retriever = Retriever::http(&release.base_url(DEFAULT_HOST), Default::default())?;
//! let options = DownloadOptions { selector: Selector::TestSplit, ..Default::default() };
//! let (manifest, report) = retriever.retrieve("/data/hoot".as_ref(), &options)?;
//! ```

mod download;
mod error;
mod extractor;
mod release;
mod selector;
mod state;
mod strategy;
mod transport;

use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::batch::{BatchProgressCallback, CancellationToken, ProgressCounters};
use crate::dataset::{
    is_safe_file_name, is_valid_class_name, Manifest, ManifestError, MANIFEST_FILENAME,
};

pub use download::{staging_path, transfer, DownloadJob, TransferOutcome, STAGING_SUFFIX};
pub use error::{RetrieveError, RetrieveResult};
pub use extractor::{ArchiveExtractor, ZipExtractor};
pub use release::{Quality, Release, DEFAULT_HOST, DEFAULT_RELEASE, KNOWN_RELEASES};
pub use selector::Selector;
pub use state::{DownloadReport, ItemFailure, ItemResult, Stage};
pub use strategy::{strategy_for, DownloadStrategy, ParallelStrategy, SequentialStrategy};
pub use transport::{FileTransport, HttpTransport, Transport, TransportResponse, DEFAULT_TIMEOUT_SECS};

/// Settings for one download run.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub selector: Selector,
    /// Download again even when the canonical archive exists.
    pub clean: bool,
    /// Unpack each archive into `{class}/{video}/`.
    pub extract: bool,
    /// Delete each archive after it was unpacked.
    pub remove_archives: bool,
    /// Concurrent downloads.
    pub workers: usize,
    /// Check content hashes before promoting downloads.
    pub verify_checksums: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            selector: Selector::All,
            clean: false,
            extract: false,
            remove_archives: false,
            workers: 4,
            verify_checksums: true,
        }
    }
}

/// Downloads a published dataset through a [`Transport`].
pub struct Retriever {
    transport: Box<dyn Transport>,
    extractor: Box<dyn ArchiveExtractor>,
    cancellation: CancellationToken,
    progress: Option<BatchProgressCallback>,
}

impl Retriever {
    /// Create a retriever over any transport.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            extractor: Box::new(ZipExtractor::new()),
            cancellation: CancellationToken::new(),
            progress: None,
        }
    }

    /// Create a retriever fetching from `base_url` over HTTP.
    pub fn http(base_url: &str, timeout: Duration) -> RetrieveResult<Self> {
        Ok(Self::new(HttpTransport::new(base_url, timeout)?))
    }

    /// Stop starting new videos once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Report per-video progress.
    pub fn with_progress(mut self, callback: BatchProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_extractor(mut self, extractor: impl ArchiveExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    /// Fetch and parse the remote manifest.
    pub fn fetch_manifest(&self) -> RetrieveResult<Manifest> {
        let url = self.transport.location(MANIFEST_FILENAME);
        let response = self.transport.get(MANIFEST_FILENAME)?;

        if let Some(content_type) = &response.content_type {
            if !content_type.to_ascii_lowercase().contains("json") {
                return Err(RetrieveError::UnexpectedContentType {
                    url,
                    content_type: content_type.clone(),
                });
            }
        }

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| RetrieveError::FetchFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let manifest =
            Manifest::from_json_slice(&bytes).map_err(|e| RetrieveError::ManifestParse {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        info!(
            url = %url,
            version = %manifest.version,
            videos = manifest.entry_count(),
            "Fetched manifest"
        );
        Ok(manifest)
    }

    /// Fetch the root files listed in `additionalFiles` into `dest_root`.
    pub fn fetch_additional_files(&self, manifest: &Manifest, dest_root: &Path) -> RetrieveResult<()> {
        for name in &manifest.additional_files {
            if !is_safe_file_name(name) {
                return Err(RetrieveError::InvalidEntryPath {
                    class: String::new(),
                    path: name.clone(),
                });
            }
            let target = dest_root.join(name);
            let staging = staging_path(&target);
            download::fetch_to(self.transport.as_ref(), name, &staging, None)?;
            fs::rename(&staging, &target).map_err(|e| RetrieveError::WriteFailed {
                path: target.clone(),
                source: e,
            })?;
            debug!(file = %name, "Fetched additional file");
        }
        Ok(())
    }

    /// Selected videos of `manifest`, mapped into `dest_root`.
    ///
    /// Fails if any selected entry's class or archive name cannot be used as
    /// a local path component.
    pub fn plan(
        &self,
        manifest: &Manifest,
        dest_root: &Path,
        selector: &Selector,
    ) -> RetrieveResult<Vec<DownloadJob>> {
        let mut jobs = Vec::new();
        for (class, entry) in manifest.entries() {
            if !selector.matches(class, entry) {
                continue;
            }
            if !is_valid_class_name(class)
                || !is_safe_file_name(entry.archive_name())
                || !is_safe_file_name(&entry.id)
            {
                return Err(RetrieveError::InvalidEntryPath {
                    class: class.to_string(),
                    path: entry.path.clone(),
                });
            }
            jobs.push(DownloadJob::new(class, entry, dest_root));
        }
        Ok(jobs)
    }

    /// Download the selected videos of `manifest` into `dest_root`.
    ///
    /// Fatal problems (unwritable destination, unusable manifest paths,
    /// missing additional files) are returned as errors. Per-video failures
    /// do not stop the batch; they are collected in the report.
    pub fn download_all(
        &self,
        manifest: &Manifest,
        dest_root: &Path,
        options: &DownloadOptions,
    ) -> RetrieveResult<DownloadReport> {
        fs::create_dir_all(dest_root).map_err(|e| RetrieveError::CreateDirFailed {
            path: dest_root.to_path_buf(),
            source: e,
        })?;
        self.fetch_additional_files(manifest, dest_root)?;

        let jobs = self.plan(manifest, dest_root, &options.selector)?;
        info!(
            selector = %options.selector,
            selected = jobs.len(),
            workers = options.workers,
            "Downloading videos"
        );

        let counters = ProgressCounters::new(jobs.len());
        let task = |job: &DownloadJob| {
            let result = self.retrieve_item(job, options);
            if !matches!(result, ItemResult::Cancelled) {
                let bytes = match &result {
                    ItemResult::Done {
                        transfer: TransferOutcome::Downloaded { bytes },
                        ..
                    } => *bytes,
                    _ => 0,
                };
                counters.item_finished(bytes, self.progress.as_ref());
            }
            result
        };

        let results = strategy_for(options.workers).execute(&jobs, &task);

        if results.len() != jobs.len() {
            warn!(
                expected = jobs.len(),
                actual = results.len(),
                "Download strategy result count does not match jobs"
            );
        }
        let mut results = results.into_iter();
        let mut report = DownloadReport::new(jobs.len());
        for job in &jobs {
            let result = results
                .next()
                .unwrap_or_else(|| strategy::worker_failure(job, "no result reported"));
            if let ItemResult::Failed(failure) = &result {
                warn!(
                    class = %failure.class,
                    item = %failure.item_id,
                    stage = %failure.stage,
                    error = %failure.error,
                    "Video not retrieved"
                );
            }
            report.record(result);
        }

        info!(
            downloaded = report.downloaded,
            skipped = report.skipped,
            extracted = report.extracted,
            failed = report.failure_count(),
            cancelled = report.cancelled,
            "Download finished"
        );
        Ok(report)
    }

    /// Fetch the manifest, store it in `dest_root`, and download.
    pub fn retrieve(
        &self,
        dest_root: &Path,
        options: &DownloadOptions,
    ) -> RetrieveResult<(Manifest, DownloadReport)> {
        let manifest = self.fetch_manifest()?;
        fs::create_dir_all(dest_root).map_err(|e| RetrieveError::CreateDirFailed {
            path: dest_root.to_path_buf(),
            source: e,
        })?;
        let manifest_path = dest_root.join(MANIFEST_FILENAME);
        manifest.write_to(&manifest_path).map_err(|e| match e {
            ManifestError::Io { path, source } => RetrieveError::WriteFailed { path, source },
            ManifestError::Parse(e) => RetrieveError::ManifestParse {
                url: manifest_path.display().to_string(),
                reason: e.to_string(),
            },
        })?;

        let report = self.download_all(&manifest, dest_root, options)?;
        Ok((manifest, report))
    }

    /// Transfer, then optionally unpack, one video.
    fn retrieve_item(&self, job: &DownloadJob, options: &DownloadOptions) -> ItemResult {
        if self.cancellation.is_cancelled() {
            return ItemResult::Cancelled;
        }

        let transfer_outcome = match transfer(
            self.transport.as_ref(),
            job,
            options.clean,
            options.verify_checksums,
        ) {
            Ok(outcome) => outcome,
            Err(failure) => return ItemResult::Failed(failure),
        };

        if !options.extract {
            return ItemResult::Done {
                transfer: transfer_outcome,
                extracted: false,
            };
        }

        let fail = |stage, error| {
            ItemResult::Failed(ItemFailure {
                class: job.class.clone(),
                item_id: job.entry.id.clone(),
                stage,
                error,
            })
        };

        match self.extractor.extract(&job.archive_path, &job.extract_dir) {
            Ok(files) => {
                debug!(class = %job.class, item = %job.entry.id, files, "Extracted archive");
            }
            Err(e) => return fail(Stage::Extract, e),
        }

        if options.remove_archives {
            if let Err(e) = fs::remove_file(&job.archive_path) {
                return fail(
                    Stage::Cleanup,
                    RetrieveError::RemoveFailed {
                        path: job.archive_path.clone(),
                        source: e,
                    },
                );
            }
        }

        ItemResult::Done {
            transfer: transfer_outcome,
            extracted: true,
        }
    }
}
