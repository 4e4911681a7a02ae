//! Downloads only become canonical archives after verification, and a
//! completed download is never fetched again.

mod common;

use std::fs;
use std::sync::Arc;

use hoot::dataset::{verify_archives, Manifest};
use hoot::retriever::{DownloadOptions, RetrieveError, Retriever, Stage};
use tempfile::TempDir;

use common::{build, source_tree, ScriptedTransport, VIDEOS};

struct Fixture {
    _temp: TempDir,
    published: std::path::PathBuf,
    local: std::path::PathBuf,
    manifest: Manifest,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    let published = temp.path().join("published");
    let local = temp.path().join("local");
    source_tree(&src);
    let manifest = build(&src, &published).manifest;
    Fixture {
        _temp: temp,
        published,
        local,
        manifest,
    }
}

#[test]
fn test_truncated_download_is_never_promoted() {
    let fx = fixture();
    let transport = Arc::new(ScriptedTransport::new(&fx.published));
    transport.truncate(Some("apple/002.zip"));
    let retriever = Retriever::new(Arc::clone(&transport));

    let report = retriever
        .download_all(&fx.manifest, &fx.local, &DownloadOptions::default())
        .unwrap();

    assert_eq!(report.downloaded, VIDEOS.len() - 1);
    assert_eq!(report.failure_count(), 1);
    let failure = &report.failures[0];
    assert_eq!((failure.class.as_str(), failure.item_id.as_str()), ("apple", "002"));
    assert_eq!(failure.stage, Stage::Verify);
    assert!(matches!(failure.error, RetrieveError::SizeMismatch { .. }));

    assert!(!fx.local.join("apple/002.zip").exists());
    assert!(fx.local.join("apple/002.zip.tmp").exists());
    assert!(fx.local.join("apple/001.zip").exists());

    // A later run with a healthy transport completes the missing video only
    transport.truncate(None);
    let report = retriever
        .download_all(&fx.manifest, &fx.local, &DownloadOptions::default())
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.skipped, VIDEOS.len() - 1);
    assert_eq!(transport.calls("apple/002.zip"), 2);
    assert_eq!(transport.calls("apple/001.zip"), 1);
    assert!(!fx.local.join("apple/002.zip.tmp").exists());
    assert!(verify_archives(&fx.manifest, &fx.local).is_empty());
}

#[test]
fn test_hash_mismatch_keeps_canonical_path_empty() {
    let fx = fixture();
    let mut manifest = fx.manifest.clone();
    manifest.class_groups[0].entries[0].content_hash = "0".repeat(64);
    let retriever = Retriever::new(ScriptedTransport::new(&fx.published));

    let report = retriever
        .download_all(&manifest, &fx.local, &DownloadOptions::default())
        .unwrap();

    assert_eq!(report.failure_count(), 1);
    assert!(matches!(report.failures[0].error, RetrieveError::HashMismatch { .. }));
    assert!(!fx.local.join("apple/001.zip").exists());
}

#[test]
fn test_hash_check_can_be_disabled() {
    let fx = fixture();
    let mut manifest = fx.manifest.clone();
    manifest.class_groups[0].entries[0].content_hash = "0".repeat(64);
    let retriever = Retriever::new(ScriptedTransport::new(&fx.published));
    let options = DownloadOptions {
        verify_checksums: false,
        ..DownloadOptions::default()
    };

    let report = retriever.download_all(&manifest, &fx.local, &options).unwrap();

    assert!(report.is_complete());
    assert!(fx.local.join("apple/001.zip").exists());
}

#[test]
fn test_second_download_fetches_no_archives() {
    let fx = fixture();
    let transport = Arc::new(ScriptedTransport::new(&fx.published));
    let retriever = Retriever::new(Arc::clone(&transport));

    let first = retriever
        .download_all(&fx.manifest, &fx.local, &DownloadOptions::default())
        .unwrap();
    assert_eq!(first.downloaded, VIDEOS.len());
    assert_eq!(transport.archive_calls(), VIDEOS.len());

    let before: Vec<_> = VIDEOS
        .iter()
        .map(|(c, id)| fs::read(fx.local.join(c).join(format!("{}.zip", id))).unwrap())
        .collect();

    let second = retriever
        .download_all(&fx.manifest, &fx.local, &DownloadOptions::default())
        .unwrap();

    assert_eq!(second.downloaded, 0);
    assert_eq!(second.skipped, VIDEOS.len());
    assert_eq!(transport.archive_calls(), VIDEOS.len());

    let after: Vec<_> = VIDEOS
        .iter()
        .map(|(c, id)| fs::read(fx.local.join(c).join(format!("{}.zip", id))).unwrap())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_clean_download_fetches_again() {
    let fx = fixture();
    let transport = Arc::new(ScriptedTransport::new(&fx.published));
    let retriever = Retriever::new(Arc::clone(&transport));

    retriever
        .download_all(&fx.manifest, &fx.local, &DownloadOptions::default())
        .unwrap();
    let options = DownloadOptions {
        clean: true,
        ..DownloadOptions::default()
    };
    let report = retriever.download_all(&fx.manifest, &fx.local, &options).unwrap();

    assert_eq!(report.downloaded, VIDEOS.len());
    assert_eq!(transport.archive_calls(), 2 * VIDEOS.len());
}
