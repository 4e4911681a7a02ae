//! Build a dataset, retrieve it through a local transport, and unpack it.

mod common;

use std::fs;

use hoot::dataset::{verify_archives, Manifest, MANIFEST_FILENAME};
use hoot::retriever::{DownloadOptions, FileTransport, Retriever, Selector};
use tempfile::TempDir;

use common::{build, source_tree, VIDEOS};

#[test]
fn test_build_retrieve_extract_round_trip() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    let published = temp.path().join("published");
    let local = temp.path().join("local");
    source_tree(&src);

    let summary = build(&src, &published);
    assert_eq!(summary.packaged, VIDEOS.len());
    assert!(verify_archives(&summary.manifest, &published).is_empty());

    let retriever = Retriever::new(FileTransport::new(&published));
    let options = DownloadOptions {
        extract: true,
        ..DownloadOptions::default()
    };
    let (manifest, report) = retriever.retrieve(&local, &options).unwrap();

    assert_eq!(manifest, summary.manifest);
    assert!(report.is_complete(), "failures: {:?}", report.failures);
    assert_eq!(report.downloaded, VIDEOS.len());
    assert_eq!(report.extracted, VIDEOS.len());

    // Stored manifest and root files
    assert_eq!(Manifest::read_from(&local.join(MANIFEST_FILENAME)).unwrap(), manifest);
    assert_eq!(fs::read(local.join("LICENSE.txt")).unwrap(), b"license text");
    assert!(local.join("test.txt").exists());
    assert!(!local.join("README.md").exists());

    // Archives pass the integrity check where they landed
    assert!(verify_archives(&manifest, &local).is_empty());

    // Extracted files match the source, minus filtered extensions
    for (class, id) in VIDEOS {
        let extracted = local.join(class).join(id);
        let source = src.join(class).join(id);
        for name in ["000001.png", "000002.png", "anno.json", "meta.info"] {
            assert_eq!(
                fs::read(extracted.join(name)).unwrap(),
                fs::read(source.join(name)).unwrap(),
                "{}/{}/{}",
                class,
                id,
                name
            );
        }
        assert!(!extracted.join("notes.md").exists());
    }
}

#[test]
fn test_manifest_carries_split_and_tags() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    let published = temp.path().join("published");
    source_tree(&src);

    let manifest = build(&src, &published).manifest;

    assert_eq!(manifest.version, "1.0");
    assert_eq!(
        manifest.additional_files,
        vec!["LICENSE.txt", "test.txt", "train.txt"]
    );
    let names: Vec<_> = manifest.class_groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["apple", "toy_car"]);

    let occluded = manifest.find("apple", "001").unwrap();
    assert!(occluded.test_split);
    assert_eq!(occluded.path, "apple/001.zip");
    assert!(occluded.has_tag("solid"));
    assert!(!occluded.has_tag("absent"));
    assert_eq!(occluded.occlusion_levels.mean_target_occlusion_level, 0.375);

    let visible = manifest.find("apple", "002").unwrap();
    assert!(!visible.test_split);
    assert!(visible.has_tag("absent"));
    assert!(!visible.has_tag("solid"));
}

#[test]
fn test_test_split_selection_downloads_only_test_videos() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    let published = temp.path().join("published");
    let local = temp.path().join("local");
    source_tree(&src);
    build(&src, &published);

    let options = DownloadOptions {
        selector: Selector::TestSplit,
        ..DownloadOptions::default()
    };
    let (_, report) = Retriever::new(FileTransport::new(&published))
        .retrieve(&local, &options)
        .unwrap();

    assert_eq!(report.selected, 1);
    assert_eq!(report.downloaded, 1);
    assert!(local.join("apple/001.zip").exists());
    assert!(!local.join("apple/002.zip").exists());
    assert!(!local.join("toy_car/001.zip").exists());
}

#[test]
fn test_remove_archives_after_extraction() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    let published = temp.path().join("published");
    let local = temp.path().join("local");
    source_tree(&src);
    build(&src, &published);

    let options = DownloadOptions {
        selector: Selector::Class("apple".to_string()),
        extract: true,
        remove_archives: true,
        ..DownloadOptions::default()
    };
    let (_, report) = Retriever::new(FileTransport::new(&published))
        .retrieve(&local, &options)
        .unwrap();

    assert_eq!(report.extracted, 2);
    assert!(!local.join("apple/001.zip").exists());
    assert!(local.join("apple/001/anno.json").exists());
    assert!(local.join("apple/002/000002.png").exists());
}

#[test]
fn test_tag_and_class_selection() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    let published = temp.path().join("published");
    let local = temp.path().join("local");
    source_tree(&src);
    build(&src, &published);

    let selector = Selector::Tag("solid".to_string()).and(Selector::Class("toy_car".to_string()));
    let options = DownloadOptions {
        selector,
        workers: 1,
        ..DownloadOptions::default()
    };
    let (_, report) = Retriever::new(FileTransport::new(&published))
        .retrieve(&local, &options)
        .unwrap();

    assert_eq!(report.selected, 1);
    assert!(local.join("toy_car/001.zip").exists());
    assert!(!local.join("apple/001.zip").exists());
}
