//! Dataset manifest model and naming rules.
//!
//! The manifest is the published description of every packaged video:
//!
//! ```text
//! Manifest
//! ├── version, changeLog, dateCreated
//! ├── additionalFiles: [LICENSE.txt, test.txt, train.txt]
//! └── classes: [ClassGroup]
//!         ├── name: "apple"
//!         └── videos: [ManifestEntry]
//!                 ├── id, path, sha256
//!                 ├── downloadSize, installSize, testSplit
//!                 └── occlusionLevels, tags
//! ```
//!
//! It is produced once per build by the
//! [`DatasetBuilder`](crate::publisher::DatasetBuilder) and consumed read-only
//! by any number of [`Retriever`](crate::retriever::Retriever)s.

mod manifest;
mod naming;
mod verify;

pub use manifest::{ClassGroup, Manifest, ManifestEntry, ManifestError, OcclusionLevels};
pub use naming::{
    archive_filename, archive_relative_path, is_valid_class_name, is_valid_item_id,
    is_safe_file_name, is_valid_version, split_key, MANIFEST_FILENAME, TEST_SPLIT_FILENAME,
};
pub use verify::{verify_archives, ArchiveIssue, IssueKind};
