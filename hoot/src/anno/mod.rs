//! Annotation loading for HOOT videos.
//!
//! Each video directory holds its frames plus two JSON documents:
//!
//! - `anno.json`: per-frame boxes, occlusion masks and attributes, and the
//!   video-level occlusion statistics
//! - `meta.info`: frame dimensions and video-level motion/target tags
//!
//! The build pipeline only needs a small summary of each video (occlusion
//! statistics and derived tags), exposed through the [`AnnotationLoader`]
//! trait. [`AnnoJsonLoader`] is the production implementation; tests can
//! substitute their own.

mod masks;
mod tags;
mod video;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::dataset::OcclusionLevels;

pub use masks::{Mask, OcclusionMasks, OcclusionType};
pub use tags::{MotionTag, OcclusionTag, TargetTag};
pub use video::{load_video, Frame, FrameAttributes, Video, ANNOTATION_FILENAME, META_FILENAME};

/// Errors loading a video's annotation files.
#[derive(Debug, Error)]
pub enum AnnotationError {
    /// A required annotation file does not exist.
    #[error("annotation file not found: {0}")]
    Missing(PathBuf),

    /// An annotation file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An annotation file is not valid JSON of the expected shape.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The part of a video's annotation that is published in the manifest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemAnnotation {
    pub occlusion_levels: OcclusionLevels,
    pub tags: BTreeSet<String>,
}

/// Source of per-video annotation summaries.
pub trait AnnotationLoader: Send + Sync {
    /// Load the summary for the video stored in `item_dir`.
    fn load(&self, item_dir: &Path) -> Result<ItemAnnotation, AnnotationError>;
}

/// Loads summaries from `anno.json` and `meta.info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnnoJsonLoader;

impl AnnoJsonLoader {
    pub fn new() -> Self {
        Self
    }
}

impl AnnotationLoader for AnnoJsonLoader {
    fn load(&self, item_dir: &Path) -> Result<ItemAnnotation, AnnotationError> {
        let video = load_video(item_dir)?;
        Ok(ItemAnnotation {
            occlusion_levels: video.occlusion_levels(),
            tags: video
                .occlusion_tags()
                .into_iter()
                .map(|t| t.as_str().to_string())
                .collect(),
        })
    }
}
