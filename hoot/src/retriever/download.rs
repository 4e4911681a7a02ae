//! Verified transfer of a single archive.
//!
//! Every transfer streams into `{archive}.tmp` and is promoted to its
//! canonical name by an atomic rename only after the staged file's size (and,
//! when enabled, content hash) match the manifest. The canonical name
//! therefore only ever refers to a complete, verified archive, and its
//! presence alone lets a later run skip the item.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::{RetrieveError, RetrieveResult};
use super::state::{ItemFailure, Stage};
use super::transport::Transport;
use crate::dataset::ManifestEntry;
use crate::digest::content_hash_of_archive;

/// Suffix of an archive that is still being transferred.
pub const STAGING_SUFFIX: &str = ".tmp";

/// Buffer size for streaming downloads to disk (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// One video scheduled for retrieval.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub class: String,
    pub entry: ManifestEntry,
    /// Canonical local archive path, `{dest}/{class}/{video}.zip`.
    pub archive_path: PathBuf,
    /// Extraction directory, `{dest}/{class}/{video}/`.
    pub extract_dir: PathBuf,
}

impl DownloadJob {
    pub fn new(class: &str, entry: &ManifestEntry, dest_root: &Path) -> Self {
        let class_dir = dest_root.join(class);
        Self {
            class: class.to_string(),
            archive_path: class_dir.join(entry.archive_name()),
            extract_dir: class_dir.join(&entry.id),
            entry: entry.clone(),
        }
    }

    pub(crate) fn failure(&self, stage: Stage, error: RetrieveError) -> ItemFailure {
        ItemFailure {
            class: self.class.clone(),
            item_id: self.entry.id.clone(),
            stage,
            error,
        }
    }
}

/// Result of a successful transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The archive was fetched, verified and promoted.
    Downloaded { bytes: u64 },
    /// The canonical archive already existed; the transport was not used.
    Skipped,
}

/// Staging path for a download (`001.zip` -> `001.zip.tmp`).
pub fn staging_path(archive_path: &Path) -> PathBuf {
    let mut name = archive_path.file_name().unwrap_or_default().to_os_string();
    name.push(STAGING_SUFFIX);
    archive_path.with_file_name(name)
}

/// Retrieve one archive.
///
/// # Arguments
///
/// * `transport` - Source of the archive bytes
/// * `job` - The video to retrieve
/// * `clean` - Download again even if the canonical archive exists
/// * `verify_hash` - Recompute and compare the content hash before promotion
///
/// On failure the canonical archive is left as it was; a staged file that
/// failed verification stays in place for inspection and is overwritten by
/// the next attempt.
pub fn transfer(
    transport: &dyn Transport,
    job: &DownloadJob,
    clean: bool,
    verify_hash: bool,
) -> Result<TransferOutcome, ItemFailure> {
    if !clean && job.archive_path.exists() {
        debug!(class = %job.class, item = %job.entry.id, "Archive present, skipping");
        return Ok(TransferOutcome::Skipped);
    }

    let staging = staging_path(&job.archive_path);
    let bytes = fetch_to(transport, &job.entry.path, &staging, Some(job.entry.download_size))
        .map_err(|e| job.failure(Stage::Fetch, e))?;

    verify_staged(&staging, &job.entry, verify_hash).map_err(|e| {
        warn!(
            class = %job.class,
            item = %job.entry.id,
            error = %e,
            "Staged archive failed verification"
        );
        job.failure(Stage::Verify, e)
    })?;

    fs::rename(&staging, &job.archive_path).map_err(|e| {
        job.failure(
            Stage::Promote,
            RetrieveError::WriteFailed {
                path: job.archive_path.clone(),
                source: e,
            },
        )
    })?;

    debug!(class = %job.class, item = %job.entry.id, bytes, "Archive promoted");
    Ok(TransferOutcome::Downloaded { bytes })
}

/// Stream `path` from the transport into `dest`. Returns bytes written.
///
/// When `expected_size` is given and the transport announces a different
/// length, nothing is written.
pub(crate) fn fetch_to(
    transport: &dyn Transport,
    path: &str,
    dest: &Path,
    expected_size: Option<u64>,
) -> RetrieveResult<u64> {
    let response = transport.get(path)?;
    if let (Some(expected), Some(announced)) = (expected_size, response.content_length) {
        if expected != announced {
            return Err(RetrieveError::SizeMismatch {
                path: dest.to_path_buf(),
                expected,
                actual: announced,
            });
        }
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| RetrieveError::CreateDirFailed {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let mut body = response.into_reader();
    let file = File::create(dest).map_err(|e| RetrieveError::WriteFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut writer = BufWriter::new(file);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let read = body
            .read(&mut buffer)
            .map_err(|e| RetrieveError::FetchFailed {
                url: transport.location(path),
                reason: format!("read error: {}", e),
            })?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..read])
            .map_err(|e| RetrieveError::WriteFailed {
                path: dest.to_path_buf(),
                source: e,
            })?;
        written += read as u64;
    }

    let file = writer.into_inner().map_err(|e| RetrieveError::WriteFailed {
        path: dest.to_path_buf(),
        source: e.into_error(),
    })?;
    file.sync_all().map_err(|e| RetrieveError::WriteFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(written)
}

fn verify_staged(staging: &Path, entry: &ManifestEntry, verify_hash: bool) -> RetrieveResult<()> {
    let actual = fs::metadata(staging)
        .map_err(|e| RetrieveError::ReadFailed {
            path: staging.to_path_buf(),
            source: e,
        })?
        .len();
    if actual != entry.download_size {
        return Err(RetrieveError::SizeMismatch {
            path: staging.to_path_buf(),
            expected: entry.download_size,
            actual,
        });
    }

    if verify_hash {
        let (hash, _) =
            content_hash_of_archive(staging).map_err(|e| RetrieveError::CorruptArchive {
                path: staging.to_path_buf(),
                reason: e.to_string(),
            })?;
        if hash != entry.content_hash {
            return Err(RetrieveError::HashMismatch {
                path: staging.to_path_buf(),
                expected: entry.content_hash.clone(),
                actual: hash,
            });
        }
    }

    Ok(())
}
