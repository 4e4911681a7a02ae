//! Closed tag vocabularies.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Occlusion tags derived from per-frame masks and attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcclusionTag {
    Solid,
    Sparse,
    SemiTransparent,
    Transparent,
    Absent,
    FullOcclusion,
    SimilarOccluder,
    CutByFrame,
    PartialObjOcclusion,
}

impl OcclusionTag {
    pub const ALL: [OcclusionTag; 9] = [
        Self::Solid,
        Self::Sparse,
        Self::SemiTransparent,
        Self::Transparent,
        Self::Absent,
        Self::FullOcclusion,
        Self::SimilarOccluder,
        Self::CutByFrame,
        Self::PartialObjOcclusion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solid => "solid",
            Self::Sparse => "sparse",
            Self::SemiTransparent => "semi_transparent",
            Self::Transparent => "transparent",
            Self::Absent => "absent",
            Self::FullOcclusion => "full_occlusion",
            Self::SimilarOccluder => "similar_occluder",
            Self::CutByFrame => "cut_by_frame",
            Self::PartialObjOcclusion => "partial_obj_occlusion",
        }
    }

    /// Parse a tag name as it appears in a manifest.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// Camera and scene motion tags from `meta.info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionTag {
    Blur,
    MovingOccluder,
    Parallax,
    Dynamic,
    CameraMotion,
}

impl MotionTag {
    pub const ALL: [MotionTag; 5] = [
        Self::Blur,
        Self::MovingOccluder,
        Self::Parallax,
        Self::Dynamic,
        Self::CameraMotion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blur => "blur",
            Self::MovingOccluder => "moving_occluder",
            Self::Parallax => "parallax",
            Self::Dynamic => "dynamic",
            Self::CameraMotion => "camera_motion",
        }
    }
}

/// Target object tags from `meta.info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTag {
    Deformable,
    SelfPropelled,
    Animate,
}

impl TargetTag {
    pub const ALL: [TargetTag; 3] = [Self::Deformable, Self::SelfPropelled, Self::Animate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deformable => "deformable",
            Self::SelfPropelled => "self_propelled",
            Self::Animate => "animate",
        }
    }
}

macro_rules! impl_display {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

impl_display!(OcclusionTag, MotionTag, TargetTag);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occlusion_tag_names_match_serde() {
        for tag in OcclusionTag::ALL {
            let json = serde_json::to_string(&tag).unwrap();
            assert_eq!(json, format!("\"{}\"", tag.as_str()));
            assert_eq!(OcclusionTag::parse(tag.as_str()), Some(tag));
        }
    }

    #[test]
    fn test_parse_unknown_tag() {
        assert_eq!(OcclusionTag::parse("glass"), None);
    }

    #[test]
    fn test_motion_and_target_names() {
        assert_eq!(MotionTag::CameraMotion.to_string(), "camera_motion");
        assert_eq!(TargetTag::SelfPropelled.to_string(), "self_propelled");
        assert_eq!(MotionTag::ALL.len(), 5);
        assert_eq!(TargetTag::ALL.len(), 3);
    }
}
