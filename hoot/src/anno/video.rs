//! Video annotation model and loader.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use super::masks::{OcclusionMasks, OcclusionType};
use super::tags::{MotionTag, OcclusionTag, TargetTag};
use super::AnnotationError;
use crate::dataset::OcclusionLevels;

/// Per-frame annotation file inside a video directory.
pub const ANNOTATION_FILENAME: &str = "anno.json";

/// Video metadata file inside a video directory.
pub const META_FILENAME: &str = "meta.info";

/// Bounding box as a list of `[x, y]` points.
pub type BoundingBox = Vec<Vec<f64>>;

/// Frame-level occlusion attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct FrameAttributes {
    #[serde(default)]
    pub absent: bool,
    #[serde(default)]
    pub full_occlusion: bool,
    #[serde(default)]
    pub similar_occluder: bool,
    #[serde(default)]
    pub cut_by_frame: bool,
    #[serde(default)]
    pub partial_obj_occlusion: bool,
}

/// One annotated frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Frame {
    #[serde(deserialize_with = "frame_id")]
    pub frame_id: u32,
    #[serde(default)]
    pub rot_bb: BoundingBox,
    #[serde(default)]
    pub aa_bb: BoundingBox,
    #[serde(default)]
    pub occ_masks: OcclusionMasks,
    #[serde(default)]
    pub attributes: FrameAttributes,
}

impl Frame {
    /// Image filename for this frame (`000042.png`).
    pub fn image_name(&self) -> String {
        format!("{:06}.png", self.frame_id)
    }
}

/// A fully loaded video annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Video {
    pub video_key: String,
    pub video_path: PathBuf,
    frames: Vec<Frame>,
    pub frame_occlusion_level: f64,
    pub median_target_occlusion_level: f64,
    pub mean_target_occlusion_level: f64,
    pub height: u32,
    pub width: u32,
    pub motion_tags: BTreeSet<MotionTag>,
    pub target_tags: BTreeSet<TargetTag>,
}

impl Video {
    /// Frames ordered by ascending frame id.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Path to a frame's image.
    pub fn frame_path(&self, frame: &Frame) -> PathBuf {
        self.video_path.join(frame.image_name())
    }

    /// Summary statistics published in the manifest.
    pub fn occlusion_levels(&self) -> OcclusionLevels {
        OcclusionLevels {
            frame_occlusion_level: self.frame_occlusion_level,
            mean_target_occlusion_level: self.mean_target_occlusion_level,
            median_target_occlusion_level: self.median_target_occlusion_level,
        }
    }

    /// Union of the occlusion tags of every frame.
    ///
    /// A mask tag applies when any frame has a mask of that type; an
    /// attribute tag applies when any frame sets that attribute.
    pub fn occlusion_tags(&self) -> BTreeSet<OcclusionTag> {
        let mut tags = BTreeSet::new();
        for frame in &self.frames {
            let masks = &frame.occ_masks;
            let attrs = &frame.attributes;
            let present = [
                (masks.get(OcclusionType::Solid).is_some(), OcclusionTag::Solid),
                (masks.get(OcclusionType::Sparse).is_some(), OcclusionTag::Sparse),
                (masks.get(OcclusionType::SemiTransparent).is_some(), OcclusionTag::SemiTransparent),
                (masks.get(OcclusionType::Transparent).is_some(), OcclusionTag::Transparent),
                (attrs.absent, OcclusionTag::Absent),
                (attrs.full_occlusion, OcclusionTag::FullOcclusion),
                (attrs.similar_occluder, OcclusionTag::SimilarOccluder),
                (attrs.cut_by_frame, OcclusionTag::CutByFrame),
                (attrs.partial_obj_occlusion, OcclusionTag::PartialObjOcclusion),
            ];
            tags.extend(present.into_iter().filter(|(on, _)| *on).map(|(_, t)| t));
        }
        tags
    }
}

#[derive(Deserialize)]
struct AnnotationFile {
    #[serde(default)]
    video_key: String,
    #[serde(default)]
    frames: Vec<Frame>,
    frame_occlusion_level: f64,
    median_target_occlusion_level: f64,
    mean_target_occlusion_level: f64,
}

#[derive(Deserialize)]
struct MetaFile {
    height: u32,
    width: u32,
    #[serde(default)]
    video_tags: HashMap<String, bool>,
}

impl MetaFile {
    fn has(&self, tag: &str) -> bool {
        self.video_tags.get(tag).copied().unwrap_or(false)
    }
}

/// Load the annotation of the video stored in `dir`.
///
/// Reads `anno.json` and `meta.info`; both must exist. When the annotation
/// carries no `video_key`, one is derived as `{class}-{id}` from the
/// directory layout.
pub fn load_video(dir: &Path) -> Result<Video, AnnotationError> {
    let anno: AnnotationFile = read_json(&dir.join(ANNOTATION_FILENAME))?;
    let meta: MetaFile = read_json(&dir.join(META_FILENAME))?;

    let mut frames = anno.frames;
    frames.sort_by_key(|f| f.frame_id);

    let video_key = if anno.video_key.is_empty() {
        derive_video_key(dir)
    } else {
        anno.video_key
    };

    debug!(video = %video_key, frames = frames.len(), "Loaded annotation");

    Ok(Video {
        video_key,
        video_path: dir.to_path_buf(),
        frames,
        frame_occlusion_level: anno.frame_occlusion_level,
        median_target_occlusion_level: anno.median_target_occlusion_level,
        mean_target_occlusion_level: anno.mean_target_occlusion_level,
        height: meta.height,
        width: meta.width,
        motion_tags: MotionTag::ALL
            .into_iter()
            .filter(|t| meta.has(t.as_str()))
            .collect(),
        target_tags: TargetTag::ALL
            .into_iter()
            .filter(|t| meta.has(t.as_str()))
            .collect(),
    })
}

fn derive_video_key(dir: &Path) -> String {
    let id = dir.file_name().map(|n| n.to_string_lossy().into_owned());
    let class = dir
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned());
    match (class, id) {
        (Some(class), Some(id)) => format!("{}-{}", class, id),
        (None, Some(id)) => id,
        _ => String::new(),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AnnotationError> {
    if !path.exists() {
        return Err(AnnotationError::Missing(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|e| AnnotationError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| AnnotationError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Frame ids appear both as numbers and as zero-padded strings.
fn frame_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u32),
        Text(String),
    }

    match Id::deserialize(deserializer)? {
        Id::Number(n) => Ok(n),
        Id::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid frame id: {:?}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ANNO: &str = r#"{
        "video_key": "apple-001",
        "frame_occlusion_level": 0.5,
        "median_target_occlusion_level": 0.3,
        "mean_target_occlusion_level": 0.4,
        "frames": [
            {
                "frame_id": "2",
                "rot_bb": [[0, 0], [1, 0], [1, 1], [0, 1]],
                "aa_bb": [[0, 0], [1, 1]],
                "occ_masks": {"all": {"size": [2, 2], "counts": "04"}, "s": [], "sp": [], "st": [], "t": {"size": [2, 2], "counts": "04"}},
                "attributes": {"absent": false, "full_occlusion": true, "similar_occluder": false, "cut_by_frame": false, "partial_obj_occlusion": false}
            },
            {
                "frame_id": 1,
                "rot_bb": [],
                "aa_bb": [],
                "occ_masks": {"all": [], "s": {"size": [2, 2], "counts": "04"}, "sp": [], "st": [], "t": []},
                "attributes": {"absent": true, "full_occlusion": false, "similar_occluder": false, "cut_by_frame": false, "partial_obj_occlusion": false}
            }
        ]
    }"#;

    const META: &str = r#"{
        "height": 720,
        "width": 1280,
        "video_tags": {
            "blur": true, "moving_occluder": false, "parallax": true,
            "dynamic": false, "camera_motion": true,
            "animate": false, "deformable": true, "self_propelled": false
        }
    }"#;

    fn video_dir(anno: &str, meta: &str) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("apple").join("001");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(ANNOTATION_FILENAME), anno).unwrap();
        fs::write(dir.join(META_FILENAME), meta).unwrap();
        (temp, dir)
    }

    #[test]
    fn test_load_video_sorts_frames() {
        let (_temp, dir) = video_dir(ANNO, META);
        let video = load_video(&dir).unwrap();

        let ids: Vec<_> = video.frames().iter().map(|f| f.frame_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(video.frame_path(&video.frames()[0]), dir.join("000001.png"));
        assert_eq!(video.height, 720);
        assert_eq!(video.width, 1280);
    }

    #[test]
    fn test_occlusion_tags_union_over_frames() {
        let (_temp, dir) = video_dir(ANNO, META);
        let tags = load_video(&dir).unwrap().occlusion_tags();

        let names: Vec<_> = tags.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            names,
            vec!["solid", "transparent", "absent", "full_occlusion"]
        );
    }

    #[test]
    fn test_meta_tags() {
        let (_temp, dir) = video_dir(ANNO, META);
        let video = load_video(&dir).unwrap();

        assert_eq!(
            video.motion_tags.iter().copied().collect::<Vec<_>>(),
            vec![MotionTag::Blur, MotionTag::Parallax, MotionTag::CameraMotion]
        );
        assert_eq!(
            video.target_tags.iter().copied().collect::<Vec<_>>(),
            vec![TargetTag::Deformable]
        );
    }

    #[test]
    fn test_occlusion_levels() {
        let (_temp, dir) = video_dir(ANNO, META);
        let levels = load_video(&dir).unwrap().occlusion_levels();

        assert_eq!(levels.frame_occlusion_level, 0.5);
        assert_eq!(levels.mean_target_occlusion_level, 0.4);
        assert_eq!(levels.median_target_occlusion_level, 0.3);
    }

    #[test]
    fn test_video_key_derived_when_absent() {
        let anno = r#"{"frames": [], "frame_occlusion_level": 0,
            "median_target_occlusion_level": 0, "mean_target_occlusion_level": 0}"#;
        let (_temp, dir) = video_dir(anno, META);

        assert_eq!(load_video(&dir).unwrap().video_key, "apple-001");
    }

    #[test]
    fn test_missing_meta_file() {
        let (_temp, dir) = video_dir(ANNO, META);
        fs::remove_file(dir.join(META_FILENAME)).unwrap();

        assert!(matches!(load_video(&dir), Err(AnnotationError::Missing(_))));
    }

    #[test]
    fn test_malformed_annotation() {
        let (_temp, dir) = video_dir("{not json", META);
        assert!(matches!(load_video(&dir), Err(AnnotationError::Parse { .. })));
    }
}
