//! Archive extraction into per-video directories.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use zip::ZipArchive;

use super::error::{RetrieveError, RetrieveResult};

/// Unpacks downloaded archives.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive` into `dest_dir`. Returns the number of files written.
    fn extract(&self, archive: &Path, dest_dir: &Path) -> RetrieveResult<usize>;

    /// List entry names without extracting.
    fn list_contents(&self, archive: &Path) -> RetrieveResult<Vec<String>>;
}

/// Zip extractor that refuses entries escaping the destination directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ZipExtractor {
    pub fn new() -> Self {
        Self
    }

    fn open(&self, archive: &Path) -> RetrieveResult<ZipArchive<BufReader<File>>> {
        let file = File::open(archive).map_err(|e| RetrieveError::ReadFailed {
            path: archive.to_path_buf(),
            source: e,
        })?;
        ZipArchive::new(BufReader::new(file)).map_err(|e| RetrieveError::ExtractionFailed {
            path: archive.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &Path, dest_dir: &Path) -> RetrieveResult<usize> {
        let mut zip = self.open(archive)?;
        fs::create_dir_all(dest_dir).map_err(|e| RetrieveError::CreateDirFailed {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;

        let mut count = 0;
        for index in 0..zip.len() {
            let mut entry = zip
                .by_index(index)
                .map_err(|e| RetrieveError::ExtractionFailed {
                    path: archive.to_path_buf(),
                    reason: e.to_string(),
                })?;

            let relative = entry
                .enclosed_name()
                .ok_or_else(|| RetrieveError::ExtractionFailed {
                    path: archive.to_path_buf(),
                    reason: format!("entry escapes destination: {}", entry.name()),
                })?;
            let target = dest_dir.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(|e| RetrieveError::CreateDirFailed {
                    path: target.clone(),
                    source: e,
                })?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| RetrieveError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            let file = File::create(&target).map_err(|e| RetrieveError::WriteFailed {
                path: target.clone(),
                source: e,
            })?;
            let mut writer = BufWriter::new(file);
            io::copy(&mut entry, &mut writer).map_err(|e| RetrieveError::ExtractionFailed {
                path: archive.to_path_buf(),
                reason: format!("{}: {}", target.display(), e),
            })?;
            count += 1;
        }

        Ok(count)
    }

    fn list_contents(&self, archive: &Path) -> RetrieveResult<Vec<String>> {
        let zip = self.open(archive)?;
        Ok(zip.file_names().map(str::to_string).collect())
    }
}
