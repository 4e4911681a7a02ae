//! Content hashing for packaged videos.
//!
//! A content hash is a SHA-256 digest over the packaged files, in archive
//! order: for each file the bare filename (UTF-8, no directory) is fed to the
//! hasher, followed by the file's bytes. Container metadata (timestamps,
//! permissions, compression) never contributes, so the same frame set always
//! hashes the same regardless of how or when it was zipped.
//!
//! The packager computes the hash while writing the archive; the retriever
//! recomputes it from a downloaded archive with [`content_hash_of_archive`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use zip::ZipArchive;

/// Length of a hex-encoded SHA-256 digest.
pub const CONTENT_HASH_LEN: usize = 64;

/// Buffer size for streaming file contents through the hasher (16KB).
pub(crate) const STREAM_BUFFER_SIZE: usize = 16 * 1024;

/// Errors raised while hashing an existing archive.
#[derive(Debug, Error)]
pub enum DigestError {
    /// The archive could not be opened or read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a readable zip archive.
    #[error("invalid archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Running content hash over a sequence of named files.
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    hasher: Sha256,
    bytes: u64,
}

impl ContentHasher {
    /// Create an empty hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new file. Only the bare filename is hashed.
    pub fn begin_file(&mut self, file_name: &str) {
        self.hasher.update(file_name.as_bytes());
    }

    /// Feed a chunk of the current file's contents.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Total content bytes fed so far (filenames excluded).
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Finish and return the lowercase hex digest.
    pub fn finalize(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

/// Check that a string is a 64 character lowercase hexadecimal digest.
pub fn is_valid_content_hash(s: &str) -> bool {
    s.len() == CONTENT_HASH_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Bare filename of an archive entry name (`frames/000001.png` -> `000001.png`).
pub fn entry_file_name(entry_name: &str) -> &str {
    entry_name.rsplit('/').next().unwrap_or(entry_name)
}

/// Recompute the content hash of a packaged zip archive.
///
/// Entries are visited in archive order, which is the order the packager
/// wrote (and hashed) them. Returns the digest and the total uncompressed size.
pub fn content_hash_of_archive(path: &Path) -> Result<(String, u64), DigestError> {
    let file = File::open(path).map_err(|e| DigestError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| DigestError::Archive {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut hasher = ContentHasher::new();
    let mut buffer = vec![0u8; STREAM_BUFFER_SIZE];

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| DigestError::Archive {
            path: path.to_path_buf(),
            source: e,
        })?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        hasher.begin_file(entry_file_name(&name));

        loop {
            let read = entry.read(&mut buffer).map_err(|e| DigestError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }
    }

    let size = hasher.bytes();
    Ok((hasher.finalize(), size))
}
