//! Dataset publisher: packages a source tree into content-addressed archives.
//!
//! # Overview
//!
//! The build walks `{source}/{class}/{video}/` and produces:
//!
//! ```text
//! {dest}/manifest.json
//! {dest}/LICENSE.txt, test.txt, train.txt
//! {dest}/{class}/{video}.zip
//! {dest}/{class}/.hoot.{class}.{video}.{sha256}.{size}
//! ```
//!
//! - [`packager`](package_item) zips one video deterministically and hashes it
//! - [`BuildMarker`]s record finished videos so interrupted builds resume
//! - [`DatasetBuilder`] orchestrates the passes and publishes the manifest
//!
//! # Example
//!
//! ```ignore
//! use hoot::publisher::{BuildOptions, DatasetBuilder};
//!
//! let options = BuildOptions { version: "1.0".into(), ..Default::default() };
//! let summary = DatasetBuilder::new("/data/hoot", "/srv/hoot/v1_0/HD", options).build()?;
//! println!("{} videos", summary.manifest.entry_count());
//! ```

mod builder;
mod error;
mod marker;
mod packager;

pub use builder::{build_dataset, BuildOptions, BuildSummary, DatasetBuilder, DEFAULT_CHANGE_LOG};
pub use error::{ItemFailure, PublishError, PublishResult};
pub use marker::{find_marker, list_markers, write_marker, BuildMarker, MARKER_PREFIX};
pub use packager::{
    package_item, partial_path, AllowList, ArchiveCompression, PackageResult,
    DEFAULT_ALLOWED_EXTENSIONS, PARTIAL_SUFFIX,
};
