//! Manifest types and JSON serialization.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reading or writing a manifest document.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read or written.
    #[error("failed to access manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not a valid manifest.
    #[error("invalid manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Occlusion summary statistics for one video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcclusionLevels {
    /// Fraction of frames in which the target is occluded at all.
    pub frame_occlusion_level: f64,
    /// Mean fraction of the target occluded, over occluded frames.
    pub mean_target_occlusion_level: f64,
    /// Median fraction of the target occluded, over occluded frames.
    pub median_target_occlusion_level: f64,
}

/// Published metadata for one packaged video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Video id (the source directory name, e.g. `001`).
    pub id: String,

    /// Archive location relative to the dataset root (e.g. `apple/001.zip`).
    #[serde(alias = "url")]
    pub path: String,

    /// Content hash of the packaged files.
    #[serde(rename = "sha256")]
    pub content_hash: String,

    /// Size of the zip archive in bytes.
    pub download_size: u64,

    /// Total size of the packaged files in bytes.
    pub install_size: u64,

    /// Whether the video belongs to the test split.
    pub test_split: bool,

    /// Occlusion statistics from the video's annotation.
    pub occlusion_levels: OcclusionLevels,

    /// Tags derived from the annotation, sorted.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl ManifestEntry {
    /// Archive filename component of [`path`](Self::path).
    pub fn archive_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Check whether the entry carries a tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// All videos of one target class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassGroup {
    /// Class name (e.g. `apple`).
    pub name: String,

    /// Videos in source traversal order.
    #[serde(default, rename = "videos")]
    pub entries: Vec<ManifestEntry>,
}

impl ClassGroup {
    /// Create an empty class group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }
}

/// The published dataset manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Dataset version (e.g. `1.0`).
    pub version: String,

    /// Human readable change log for this version.
    pub change_log: String,

    /// Build date, serialized as `YYYY-MM-DD`.
    pub date_created: NaiveDate,

    /// Root files published next to the manifest (license, split lists).
    #[serde(default)]
    pub additional_files: Vec<String>,

    /// Class groups in source traversal order.
    #[serde(default, rename = "classes")]
    pub class_groups: Vec<ClassGroup>,
}

impl Manifest {
    /// Create an empty manifest.
    pub fn new(
        version: impl Into<String>,
        change_log: impl Into<String>,
        date_created: NaiveDate,
    ) -> Self {
        Self {
            version: version.into(),
            change_log: change_log.into(),
            date_created,
            additional_files: Vec::new(),
            class_groups: Vec::new(),
        }
    }

    /// Iterate over every entry together with its class name.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.class_groups
            .iter()
            .flat_map(|g| g.entries.iter().map(move |e| (g.name.as_str(), e)))
    }

    /// Total number of entries across all classes.
    pub fn entry_count(&self) -> usize {
        self.class_groups.iter().map(|g| g.entries.len()).sum()
    }

    /// Find an entry by class and video id.
    pub fn find(&self, class: &str, id: &str) -> Option<&ManifestEntry> {
        self.class_groups
            .iter()
            .find(|g| g.name == class)
            .and_then(|g| g.entries.iter().find(|e| e.id == id))
    }

    /// Parse a manifest from JSON bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ManifestError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Render the manifest as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a manifest file.
    pub fn read_from(path: &Path) -> Result<Self, ManifestError> {
        let bytes = fs::read(path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_slice(&bytes)
    }

    /// Write the manifest file atomically.
    ///
    /// The document is written to a sibling staging file and renamed into
    /// place, so readers never observe a partially written manifest.
    pub fn write_to(&self, path: &Path) -> Result<(), ManifestError> {
        let json = self.to_json_pretty()?;
        let staging = staging_path(path);

        fs::write(&staging, json).map_err(|e| ManifestError::Io {
            path: staging.clone(),
            source: e,
        })?;
        fs::rename(&staging, path).map_err(|e| ManifestError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
