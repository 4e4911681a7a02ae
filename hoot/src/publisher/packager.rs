//! Deterministic packaging of one video directory into a zip archive.
//!
//! Files are visited in a fixed order at every directory level (files sorted
//! by name, then subdirectories sorted by name), filtered by an extension
//! allow-list, and streamed once: each chunk feeds both the content hash and
//! the archive entry. Entry timestamps are pinned so unchanged input yields
//! byte-identical archives.
//!
//! The archive is written to `{name}.partial`, synced, and renamed into
//! place. A crash mid-item therefore never leaves a truncated archive under
//! its canonical name.

use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::{PublishError, PublishResult};
use crate::digest::{ContentHasher, STREAM_BUFFER_SIZE};

/// Extensions packaged by default.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[".png", ".json", ".txt", ".info"];

/// Suffix of an archive that is still being written.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Entries at or above this size need zip64 headers.
const LARGE_FILE_THRESHOLD: u64 = u32::MAX as u64;

/// Set of file extensions admitted into an archive.
///
/// Matching is case-sensitive; files without an extension never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    extensions: BTreeSet<String>,
}

impl AllowList {
    /// Build an allow-list from extensions, with or without the leading dot.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim().trim_start_matches('.').to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list such as `.png,.json`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Whether a file name has an admitted extension.
    pub fn allows(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.contains(e))
    }

    /// Extensions with a leading dot, sorted.
    pub fn extensions(&self) -> Vec<String> {
        self.extensions.iter().map(|e| format!(".{}", e)).collect()
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_EXTENSIONS)
    }
}

impl fmt::Display for AllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extensions().join(","))
    }
}

/// Compression applied to archive entries.
///
/// Frames are already compressed PNGs, so storing is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArchiveCompression {
    #[default]
    Stored,
    Deflated,
}

impl ArchiveCompression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Deflated => "deflated",
        }
    }

    fn method(&self) -> CompressionMethod {
        match self {
            Self::Stored => CompressionMethod::Stored,
            Self::Deflated => CompressionMethod::Deflated,
        }
    }
}

impl FromStr for ArchiveCompression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stored" | "store" | "none" => Ok(Self::Stored),
            "deflated" | "deflate" => Ok(Self::Deflated),
            other => Err(format!(
                "unknown compression '{}': expected stored or deflated",
                other
            )),
        }
    }
}

impl fmt::Display for ArchiveCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of packaging one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageResult {
    pub id: String,
    /// SHA-256 over the packaged file names and bytes.
    pub content_hash: String,
    /// Total bytes of the packaged files.
    pub uncompressed_size: u64,
    pub archive_path: PathBuf,
    pub file_count: usize,
}

/// A file selected for packaging.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SourceFile {
    path: PathBuf,
    /// Path relative to the video directory, `/`-separated.
    entry_name: String,
    /// Bare filename fed to the content hash.
    file_name: String,
}

/// Package a video directory into `archive_path`.
///
/// # Arguments
///
/// * `id` - Video id recorded in the result
/// * `source_dir` - Directory holding the video's frames and annotation
/// * `archive_path` - Final archive location
/// * `allow_list` - Extensions to include
/// * `compression` - Entry compression
pub fn package_item(
    id: &str,
    source_dir: &Path,
    archive_path: &Path,
    allow_list: &AllowList,
    compression: ArchiveCompression,
) -> PublishResult<PackageResult> {
    let files = collect_files(source_dir, allow_list)?;
    let staging = partial_path(archive_path);

    let file = File::create(&staging).map_err(|e| PublishError::WriteFailed {
        path: staging.clone(),
        source: e,
    })?;

    let hasher = match write_archive(file, &staging, &files, compression) {
        Ok(hasher) => hasher,
        Err(e) => {
            if let Err(remove_err) = fs::remove_file(&staging) {
                warn!(path = %staging.display(), error = %remove_err, "Failed to remove partial archive");
            }
            return Err(e);
        }
    };

    fs::rename(&staging, archive_path).map_err(|e| PublishError::WriteFailed {
        path: archive_path.to_path_buf(),
        source: e,
    })?;

    let uncompressed_size = hasher.bytes();
    let content_hash = hasher.finalize();
    debug!(
        item = %id,
        files = files.len(),
        bytes = uncompressed_size,
        hash = %content_hash,
        "Packaged directory"
    );

    Ok(PackageResult {
        id: id.to_string(),
        content_hash,
        uncompressed_size,
        archive_path: archive_path.to_path_buf(),
        file_count: files.len(),
    })
}

/// Staging path for an archive being written (`001.zip.partial`).
pub fn partial_path(archive_path: &Path) -> PathBuf {
    let mut name = archive_path.file_name().unwrap_or_default().to_os_string();
    name.push(PARTIAL_SUFFIX);
    archive_path.with_file_name(name)
}

fn write_archive(
    file: File,
    staging: &Path,
    files: &[SourceFile],
    compression: ArchiveCompression,
) -> PublishResult<ContentHasher> {
    let archive_err = |e| PublishError::ArchiveFailed {
        path: staging.to_path_buf(),
        source: e,
    };

    let mut zip = ZipWriter::new(file);
    let mut hasher = ContentHasher::new();
    let mut buffer = vec![0u8; STREAM_BUFFER_SIZE];

    for source in files {
        let mut input = File::open(&source.path).map_err(|e| PublishError::ReadFailed {
            path: source.path.clone(),
            source: e,
        })?;
        let len = input
            .metadata()
            .map_err(|e| PublishError::ReadFailed {
                path: source.path.clone(),
                source: e,
            })?
            .len();

        let options = SimpleFileOptions::default()
            .compression_method(compression.method())
            .last_modified_time(DateTime::default())
            .large_file(len >= LARGE_FILE_THRESHOLD);
        zip.start_file(source.entry_name.as_str(), options)
            .map_err(archive_err)?;
        hasher.begin_file(&source.file_name);

        loop {
            let read = input
                .read(&mut buffer)
                .map_err(|e| PublishError::ReadFailed {
                    path: source.path.clone(),
                    source: e,
                })?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            zip.write_all(&buffer[..read])
                .map_err(|e| PublishError::WriteFailed {
                    path: staging.to_path_buf(),
                    source: e,
                })?;
        }
    }

    let file = zip.finish().map_err(archive_err)?;
    file.sync_all().map_err(|e| PublishError::WriteFailed {
        path: staging.to_path_buf(),
        source: e,
    })?;

    Ok(hasher)
}

/// List the files to package, in packaging order.
fn collect_files(source_dir: &Path, allow_list: &AllowList) -> PublishResult<Vec<SourceFile>> {
    let mut files = Vec::new();
    visit_dir(source_dir, "", allow_list, &mut files)?;
    Ok(files)
}

fn visit_dir(
    dir: &Path,
    prefix: &str,
    allow_list: &AllowList,
    out: &mut Vec<SourceFile>,
) -> PublishResult<()> {
    let read_err = |e| PublishError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut file_names = Vec::new();
    let mut dir_names = Vec::new();

    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %path.display(), "Skipping file with non UTF-8 name");
            continue;
        };

        let file_type = entry.file_type().map_err(read_err)?;
        if file_type.is_dir() {
            dir_names.push(name);
        } else if file_type.is_file() {
            file_names.push(name);
        } else if file_type.is_symlink() {
            // Linked directories are not followed. A dangling link is kept so
            // that opening it fails the item.
            match fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => {
                    debug!(path = %path.display(), "Skipping linked directory")
                }
                _ => file_names.push(name),
            }
        }
    }

    file_names.sort();
    dir_names.sort();

    for name in file_names {
        if !allow_list.allows(&name) {
            debug!(path = %dir.join(&name).display(), "Skipping disallowed file");
            continue;
        }
        out.push(SourceFile {
            path: dir.join(&name),
            entry_name: format!("{}{}", prefix, name),
            file_name: name,
        });
    }

    for name in dir_names {
        let sub_prefix = format!("{}{}/", prefix, name);
        visit_dir(&dir.join(&name), &sub_prefix, allow_list, out)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::content_hash_of_archive;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn write(path: &Path, contents: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn entry_names(archive: &Path) -> Vec<String> {
        let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_allow_list_matching() {
        let allow = AllowList::default();
        assert!(allow.allows("000001.png"));
        assert!(allow.allows("anno.json"));
        assert!(allow.allows("meta.info"));
        assert!(!allow.allows("notes.md"));
        assert!(!allow.allows("LICENSE"));
        assert!(!allow.allows("frame.PNG"));
    }

    #[test]
    fn test_allow_list_parse() {
        let allow = AllowList::parse(" .png, json ,,");
        assert_eq!(allow.extensions(), vec![".json", ".png"]);
        assert_eq!(allow.to_string(), ".json,.png");
    }

    #[test]
    fn test_compression_from_str() {
        assert_eq!("stored".parse(), Ok(ArchiveCompression::Stored));
        assert_eq!("Deflated".parse(), Ok(ArchiveCompression::Deflated));
        assert!("bzip2".parse::<ArchiveCompression>().is_err());
        assert_eq!(ArchiveCompression::default(), ArchiveCompression::Stored);
    }

    #[test]
    fn test_package_filters_and_orders_entries() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("001");
        write(&src.join("meta.info"), b"{}");
        write(&src.join("000002.png"), b"two");
        write(&src.join("000001.png"), b"one");
        write(&src.join("notes.md"), b"ignored");
        write(&src.join("masks/000001.png"), b"mask");

        let archive = temp.path().join("001.zip");
        let result = package_item(
            "001",
            &src,
            &archive,
            &AllowList::default(),
            ArchiveCompression::Stored,
        )
        .unwrap();

        assert_eq!(
            entry_names(&archive),
            vec!["000001.png", "000002.png", "meta.info", "masks/000001.png"]
        );
        assert_eq!(result.file_count, 4);
        assert_eq!(result.uncompressed_size, 3 + 3 + 2 + 4);
        assert!(!partial_path(&archive).exists());

        let mut expected = ContentHasher::new();
        for (name, bytes) in [
            ("000001.png", &b"one"[..]),
            ("000002.png", b"two"),
            ("meta.info", b"{}"),
            ("000001.png", b"mask"),
        ] {
            expected.begin_file(name);
            expected.update(bytes);
        }
        assert_eq!(result.content_hash, expected.finalize());
    }

    #[test]
    fn test_package_hash_matches_archive_rehash() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("001");
        write(&src.join("anno.json"), b"{\"frames\": []}");
        write(&src.join("000001.png"), &[7u8; 40_000]);

        let archive = temp.path().join("001.zip");
        let result = package_item(
            "001",
            &src,
            &archive,
            &AllowList::default(),
            ArchiveCompression::Deflated,
        )
        .unwrap();

        let (hash, size) = content_hash_of_archive(&archive).unwrap();
        assert_eq!(hash, result.content_hash);
        assert_eq!(size, result.uncompressed_size);
    }

    #[test]
    fn test_package_is_deterministic() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("a");
        let second = temp.path().join("b");

        // Same contents, created in opposite orders with different mtimes
        write(&first.join("000001.png"), b"one");
        write(&first.join("000002.png"), b"two");
        write(&first.join("anno.json"), b"{}");
        write(&second.join("anno.json"), b"{}");
        write(&second.join("000002.png"), b"two");
        write(&second.join("000001.png"), b"one");
        set_file_mtime(second.join("000001.png"), FileTime::from_unix_time(1_000, 0)).unwrap();
        set_file_mtime(first.join("anno.json"), FileTime::from_unix_time(2_000_000, 0)).unwrap();

        let allow = AllowList::default();
        let a = package_item("x", &first, &temp.path().join("a.zip"), &allow, Default::default())
            .unwrap();
        let b = package_item("x", &second, &temp.path().join("b.zip"), &allow, Default::default())
            .unwrap();

        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(entry_names(&a.archive_path), entry_names(&b.archive_path));
        assert_eq!(
            fs::read(&a.archive_path).unwrap(),
            fs::read(&b.archive_path).unwrap()
        );
    }

    #[test]
    fn test_package_missing_source_fails_without_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("001.zip");

        let result = package_item(
            "001",
            &temp.path().join("missing"),
            &archive,
            &AllowList::default(),
            ArchiveCompression::Stored,
        );

        assert!(matches!(result, Err(PublishError::ReadFailed { .. })));
        assert!(!archive.exists());
        assert!(!partial_path(&archive).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_package_dangling_link_fails_and_removes_partial() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("001");
        write(&src.join("anno.json"), b"{}");
        std::os::unix::fs::symlink(src.join("gone.png"), src.join("000001.png")).unwrap();
        let archive = temp.path().join("001.zip");

        let result = package_item(
            "001",
            &src,
            &archive,
            &AllowList::default(),
            ArchiveCompression::Stored,
        );

        match result {
            Err(PublishError::ReadFailed { path, .. }) => {
                assert_eq!(path, src.join("000001.png"))
            }
            other => panic!("expected read failure, got {:?}", other),
        }
        assert!(!archive.exists());
        assert!(!partial_path(&archive).exists());
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/dest/apple/001.zip")),
            PathBuf::from("/dest/apple/001.zip.partial")
        );
    }
}
