//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Mutex;

use hoot::publisher::{BuildOptions, BuildSummary, DatasetBuilder};
use hoot::retriever::{FileTransport, RetrieveResult, Transport, TransportResponse};

pub const VIDEOS: &[(&str, &str)] = &[("apple", "001"), ("apple", "002"), ("toy_car", "001")];

pub fn write(path: &Path, contents: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn anno_json(key: &str, occluded: bool) -> String {
    let mask = r#"{"size": [4, 4], "counts": "0@0"}"#;
    let (s, absent) = if occluded { (mask, "false") } else { ("[]", "true") };
    format!(
        r#"{{
            "video_key": "{key}",
            "frame_occlusion_level": 0.5,
            "median_target_occlusion_level": 0.25,
            "mean_target_occlusion_level": 0.375,
            "frames": [
                {{"frame_id": 2, "occ_masks": {{"all": {mask}, "s": {s}, "sp": [], "st": [], "t": []}},
                  "attributes": {{"absent": false}}}},
                {{"frame_id": 1, "occ_masks": {{"all": [], "s": [], "sp": [], "st": [], "t": []}},
                  "attributes": {{"absent": {absent}}}}}
            ]
        }}"#
    )
}

const META: &str = r#"{"height": 4, "width": 4, "video_tags": {"camera_motion": true, "animate": false}}"#;

/// Lay out a small source tree: two classes, three videos, and root files.
pub fn source_tree(root: &Path) {
    write(&root.join("LICENSE.txt"), b"license text");
    write(&root.join("test.txt"), b"apple-001\n\n");
    write(&root.join("train.txt"), b"apple-002\ntoy_car-001\n");
    write(&root.join("README.md"), b"not published");

    for (class, id) in VIDEOS {
        let dir = root.join(class).join(id);
        let key = format!("{}-{}", class, id);
        write(&dir.join("000001.png"), format!("{} frame 1", key).as_bytes());
        write(&dir.join("000002.png"), format!("{} frame 2", key).as_bytes());
        write(&dir.join("anno.json"), anno_json(&key, *id == "001").as_bytes());
        write(&dir.join("meta.info"), META.as_bytes());
        write(&dir.join("notes.md"), b"left out of the archive");
    }
}

pub fn build(src: &Path, dest: &Path) -> BuildSummary {
    let options = BuildOptions {
        version: "1.0".to_string(),
        workers: 2,
        ..BuildOptions::default()
    };
    DatasetBuilder::new(src, dest, options).build().unwrap()
}

/// File-backed transport that records requests and can damage responses.
pub struct ScriptedTransport {
    inner: FileTransport,
    calls: Mutex<HashMap<String, usize>>,
    truncate: Mutex<Option<String>>,
}

impl ScriptedTransport {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: FileTransport::new(root),
            calls: Mutex::new(HashMap::new()),
            truncate: Mutex::new(None),
        }
    }

    /// Serve only half of `path` until cleared.
    pub fn truncate(&self, path: Option<&str>) {
        *self.truncate.lock().unwrap() = path.map(str::to_string);
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    /// Requests for archives, across all paths.
    pub fn archive_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| path.ends_with(".zip"))
            .map(|(_, n)| n)
            .sum()
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, path: &str) -> RetrieveResult<TransportResponse> {
        *self.calls.lock().unwrap().entry(path.to_string()).or_default() += 1;

        let response = self.inner.get(path)?;
        let content_type = response.content_type.clone();
        let mut body = Vec::new();
        response.into_reader().read_to_end(&mut body).unwrap();

        if self.truncate.lock().unwrap().as_deref() == Some(path) {
            body.truncate(body.len() / 2);
        }

        let mut scripted = TransportResponse::new(Box::new(Cursor::new(body)));
        scripted.content_type = content_type;
        Ok(scripted)
    }
}
