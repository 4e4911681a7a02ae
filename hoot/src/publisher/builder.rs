//! The resumable dataset build.
//!
//! A build runs five passes over the source tree:
//!
//! 1. **Setup**: wipe the destination when `clean`, otherwise create it
//! 2. **Passthrough**: copy top-level `.txt` files and read the test split
//! 3. **Packaging**: package every video lacking a build marker, in parallel
//! 4. **Assembly**: read each video's marker and annotation into the manifest
//! 5. **Publish**: write `manifest.json` atomically
//!
//! Only pass 3 does real work on a rerun: a video whose marker exists is
//! skipped, and pass 4 is driven purely by the markers on disk. An
//! interrupted build therefore resumes where it stopped and produces the same
//! manifest as an uninterrupted one.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::marker::{find_marker, list_markers, write_marker, BuildMarker};
use super::packager::{package_item, AllowList, ArchiveCompression, PackageResult};
use super::{ItemFailure, PublishError, PublishResult};
use crate::anno::{AnnoJsonLoader, AnnotationLoader};
use crate::batch::{BatchProgressCallback, CancellationToken, ProgressCounters};
use crate::dataset::{
    archive_filename, archive_relative_path, is_valid_class_name, is_valid_item_id,
    is_valid_version, split_key, ClassGroup, Manifest, ManifestEntry, MANIFEST_FILENAME,
    TEST_SPLIT_FILENAME,
};

/// Default change log for a new dataset version.
pub const DEFAULT_CHANGE_LOG: &str = "Initial Release";

/// Extension of root files copied next to the manifest.
const PASSTHROUGH_EXTENSION: &str = "txt";

/// Settings for one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Dataset version, e.g. `1.0`.
    pub version: String,
    pub change_log: String,
    /// Wipe the destination and package everything again.
    pub clean: bool,
    /// Packaging workers; `0` means one per CPU.
    pub workers: usize,
    pub allow_list: AllowList,
    pub compression: ArchiveCompression,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            change_log: DEFAULT_CHANGE_LOG.to_string(),
            clean: false,
            workers: 0,
            allow_list: AllowList::default(),
            compression: ArchiveCompression::default(),
        }
    }
}

/// Result of a completed build.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub manifest: Manifest,
    pub manifest_path: PathBuf,
    /// Videos packaged in this run.
    pub packaged: usize,
    /// Videos skipped because a build marker already existed.
    pub skipped: usize,
}

#[derive(Debug, Clone)]
struct SourceItem {
    id: String,
    dir: PathBuf,
}

#[derive(Debug, Clone)]
struct SourceClass {
    name: String,
    dir: PathBuf,
    items: Vec<SourceItem>,
}

/// Root files copied to the destination.
#[derive(Debug, Default)]
struct Passthrough {
    files: Vec<String>,
    test_keys: HashSet<String>,
}

/// A video scheduled for packaging.
struct PackageJob<'a> {
    class: &'a str,
    item: &'a SourceItem,
    dest_dir: PathBuf,
}

enum JobOutcome {
    Packaged(PackageResult),
    Cancelled,
    Failed(ItemFailure),
}

/// Builds a dataset from a source tree.
///
/// ```text
/// {source}/LICENSE.txt, test.txt, train.txt
/// {source}/{class}/{video}/000001.png ... anno.json meta.info
/// ```
pub struct DatasetBuilder<L = AnnoJsonLoader> {
    source_root: PathBuf,
    dest_root: PathBuf,
    options: BuildOptions,
    loader: L,
    cancellation: CancellationToken,
    progress: Option<BatchProgressCallback>,
}

impl DatasetBuilder<AnnoJsonLoader> {
    /// Create a builder that reads annotations from `anno.json`/`meta.info`.
    pub fn new(
        source_root: impl Into<PathBuf>,
        dest_root: impl Into<PathBuf>,
        options: BuildOptions,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
            options,
            loader: AnnoJsonLoader::new(),
            cancellation: CancellationToken::new(),
            progress: None,
        }
    }
}

impl<L: AnnotationLoader> DatasetBuilder<L> {
    /// Replace the annotation loader.
    pub fn with_loader<M: AnnotationLoader>(self, loader: M) -> DatasetBuilder<M> {
        DatasetBuilder {
            source_root: self.source_root,
            dest_root: self.dest_root,
            options: self.options,
            loader,
            cancellation: self.cancellation,
            progress: self.progress,
        }
    }

    /// Stop scheduling videos once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Report packaging progress.
    pub fn with_progress(mut self, callback: BatchProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Run the build.
    pub fn build(&self) -> PublishResult<BuildSummary> {
        if !is_valid_version(&self.options.version) {
            return Err(PublishError::InvalidVersion(self.options.version.clone()));
        }
        if !self.source_root.is_dir() {
            return Err(PublishError::InvalidSource(self.source_root.clone()));
        }

        info!(
            source = %self.source_root.display(),
            dest = %self.dest_root.display(),
            version = %self.options.version,
            clean = self.options.clean,
            "Starting dataset build"
        );

        self.prepare_destination()?;
        let passthrough = self.copy_root_files()?;
        let classes = self.discover()?;
        let (packaged, skipped) = self.package_all(&classes)?;
        let manifest = self.assemble(&classes, &passthrough)?;

        let manifest_path = self.dest_root.join(MANIFEST_FILENAME);
        manifest.write_to(&manifest_path)?;
        info!(
            path = %manifest_path.display(),
            videos = manifest.entry_count(),
            packaged,
            skipped,
            "Manifest published"
        );

        Ok(BuildSummary {
            manifest,
            manifest_path,
            packaged,
            skipped,
        })
    }

    fn prepare_destination(&self) -> PublishResult<()> {
        let dest = &self.dest_root;
        if self.options.clean && dest.exists() {
            info!(dest = %dest.display(), "Removing existing destination");
            fs::remove_dir_all(dest).map_err(|e| PublishError::RemoveFailed {
                path: dest.clone(),
                source: e,
            })?;
        }
        fs::create_dir_all(dest).map_err(|e| PublishError::CreateDirectoryFailed {
            path: dest.clone(),
            source: e,
        })
    }

    /// Copy root `.txt` files and parse the test split list.
    fn copy_root_files(&self) -> PublishResult<Passthrough> {
        let mut passthrough = Passthrough::default();

        for path in sorted_entries(&self.source_root, EntryKind::File)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if path.extension().and_then(|e| e.to_str()) != Some(PASSTHROUGH_EXTENSION) {
                continue;
            }

            let target = self.dest_root.join(name);
            fs::copy(&path, &target).map_err(|e| PublishError::WriteFailed {
                path: target.clone(),
                source: e,
            })?;
            debug!(file = %name, "Copied root file");

            if name == TEST_SPLIT_FILENAME {
                let contents =
                    fs::read_to_string(&path).map_err(|e| PublishError::ReadFailed {
                        path: path.clone(),
                        source: e,
                    })?;
                passthrough.test_keys = parse_split_list(&contents);
                if passthrough.test_keys.is_empty() {
                    return Err(PublishError::EmptyTestSplit(path));
                }
            }
            passthrough.files.push(name.to_string());
        }

        if !passthrough
            .files
            .iter()
            .any(|f| f.as_str() == TEST_SPLIT_FILENAME)
        {
            return Err(PublishError::MissingTestSplit(
                self.source_root.join(TEST_SPLIT_FILENAME),
            ));
        }

        info!(
            files = passthrough.files.len(),
            test_videos = passthrough.test_keys.len(),
            "Copied root files"
        );
        Ok(passthrough)
    }

    /// List and validate every class and video directory.
    fn discover(&self) -> PublishResult<Vec<SourceClass>> {
        let mut classes = Vec::new();

        for class_dir in sorted_entries(&self.source_root, EntryKind::Dir)? {
            let name = dir_name(&class_dir);
            if !is_valid_class_name(&name) {
                return Err(PublishError::InvalidClassName(class_dir));
            }

            let mut items = Vec::new();
            for item_dir in sorted_entries(&class_dir, EntryKind::Dir)? {
                let id = dir_name(&item_dir);
                if !is_valid_item_id(&id) {
                    return Err(PublishError::InvalidItemId(item_dir));
                }
                items.push(SourceItem { id, dir: item_dir });
            }

            classes.push(SourceClass {
                name,
                dir: class_dir,
                items,
            });
        }

        Ok(classes)
    }

    /// Package every video without a marker. Returns (packaged, skipped).
    fn package_all(&self, classes: &[SourceClass]) -> PublishResult<(usize, usize)> {
        let mut jobs = Vec::new();
        let mut skipped = 0;

        for class in classes {
            let dest_dir = self.dest_root.join(&class.name);
            fs::create_dir_all(&dest_dir).map_err(|e| PublishError::CreateDirectoryFailed {
                path: dest_dir.clone(),
                source: e,
            })?;
            let markers = list_markers(&dest_dir)?;

            for item in &class.items {
                if !self.options.clean {
                    if let Some(marker) = find_marker(&class.name, &item.id, &markers) {
                        debug!(
                            class = %class.name,
                            item = %item.id,
                            hash = %marker.content_hash,
                            "Build marker found, skipping"
                        );
                        skipped += 1;
                        continue;
                    }
                }
                jobs.push(PackageJob {
                    class: &class.name,
                    item,
                    dest_dir: dest_dir.clone(),
                });
            }
        }

        info!(
            to_package = jobs.len(),
            skipped,
            source_classes = classes.len(),
            "Packaging pass"
        );
        if jobs.is_empty() {
            return Ok((0, skipped));
        }

        let mut builder = rayon::ThreadPoolBuilder::new();
        if self.options.workers > 0 {
            builder = builder.num_threads(self.options.workers);
        }
        let pool = builder
            .build()
            .map_err(|e| PublishError::WorkerPool(e.to_string()))?;

        let counters = ProgressCounters::new(jobs.len());
        let outcomes: Vec<JobOutcome> = pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    let outcome = self.run_job(job);
                    if let JobOutcome::Packaged(result) = &outcome {
                        counters.item_finished(result.uncompressed_size, self.progress.as_ref());
                    } else if let JobOutcome::Failed(_) = &outcome {
                        counters.item_finished(0, self.progress.as_ref());
                    }
                    outcome
                })
                .collect()
        });

        let mut packaged = 0;
        let mut remaining = 0;
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                JobOutcome::Packaged(_) => packaged += 1,
                JobOutcome::Cancelled => remaining += 1,
                JobOutcome::Failed(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            for failure in &failures {
                warn!(
                    class = %failure.class,
                    item = %failure.item_id,
                    error = %failure.error,
                    "Packaging failed"
                );
            }
            return Err(PublishError::PackagingFailed(failures));
        }
        if remaining > 0 {
            warn!(packaged, remaining, "Build cancelled");
            return Err(PublishError::Cancelled { remaining });
        }

        Ok((packaged, skipped))
    }

    /// Package one video and commit its marker.
    fn run_job(&self, job: &PackageJob<'_>) -> JobOutcome {
        if self.cancellation.is_cancelled() {
            return JobOutcome::Cancelled;
        }

        let archive_path = job.dest_dir.join(archive_filename(&job.item.id));
        let result = package_item(
            &job.item.id,
            &job.item.dir,
            &archive_path,
            &self.options.allow_list,
            self.options.compression,
        )
        .and_then(|result| {
            let marker = BuildMarker::new(
                job.class,
                &job.item.id,
                &result.content_hash,
                result.uncompressed_size,
            );
            write_marker(&job.dest_dir, &marker)?;
            Ok(result)
        });

        match result {
            Ok(result) => {
                info!(
                    class = %job.class,
                    item = %job.item.id,
                    files = result.file_count,
                    bytes = result.uncompressed_size,
                    "Packaged video"
                );
                JobOutcome::Packaged(result)
            }
            Err(error) => JobOutcome::Failed(ItemFailure {
                class: job.class.to_string(),
                item_id: job.item.id.clone(),
                error,
            }),
        }
    }

    /// Build the manifest from markers and annotations.
    fn assemble(
        &self,
        classes: &[SourceClass],
        passthrough: &Passthrough,
    ) -> PublishResult<Manifest> {
        let mut manifest = Manifest::new(
            self.options.version.clone(),
            self.options.change_log.clone(),
            Local::now().date_naive(),
        );
        manifest.additional_files = passthrough.files.clone();

        for class in classes {
            let dest_dir = self.dest_root.join(&class.name);
            let markers = list_markers(&dest_dir)?;
            let mut group = ClassGroup::new(class.name.clone());

            for item in &class.items {
                let marker = find_marker(&class.name, &item.id, &markers).ok_or_else(|| {
                    PublishError::MissingMarker {
                        class: class.name.clone(),
                        item_id: item.id.clone(),
                        directory: dest_dir.clone(),
                    }
                })?;

                let archive_path = dest_dir.join(archive_filename(&item.id));
                let download_size = fs::metadata(&archive_path)
                    .map_err(|e| PublishError::ReadFailed {
                        path: archive_path.clone(),
                        source: e,
                    })?
                    .len();

                let annotation =
                    self.loader
                        .load(&item.dir)
                        .map_err(|e| PublishError::AnnotationFailed {
                            path: item.dir.clone(),
                            source: e,
                        })?;

                let test_split = passthrough
                    .test_keys
                    .contains(&split_key(&class.name, &item.id));

                group.entries.push(ManifestEntry {
                    id: item.id.clone(),
                    path: archive_relative_path(&class.name, &item.id),
                    content_hash: marker.content_hash,
                    download_size,
                    install_size: marker.uncompressed_size,
                    test_split,
                    occlusion_levels: annotation.occlusion_levels,
                    tags: annotation.tags,
                });
            }

            debug!(
                class = %class.name,
                source = %class.dir.display(),
                videos = group.entries.len(),
                "Assembled class"
            );
            manifest.class_groups.push(group);
        }

        Ok(manifest)
    }
}

/// Build `dest_root` from `source_root` with default options.
pub fn build_dataset(
    source_root: &Path,
    dest_root: &Path,
    version: &str,
    clean: bool,
) -> PublishResult<Manifest> {
    let options = BuildOptions {
        version: version.to_string(),
        clean,
        ..BuildOptions::default()
    };
    DatasetBuilder::new(source_root, dest_root, options)
        .build()
        .map(|summary| summary.manifest)
}

/// Parse a split list: one `{class}-{video}` key per line, blanks ignored.
fn parse_split_list(contents: &str) -> HashSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
}

/// Files or directories directly inside `dir`, sorted by name.
fn sorted_entries(dir: &Path, kind: EntryKind) -> PublishResult<Vec<PathBuf>> {
    let read_err = |e| PublishError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let wanted = match kind {
            EntryKind::File => path.is_file(),
            EntryKind::Dir => path.is_dir(),
        };
        if wanted {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
