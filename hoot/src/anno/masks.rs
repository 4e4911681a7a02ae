//! Per-frame occlusion masks.
//!
//! Masks are stored as COCO run-length encodings with hex-encoded counts.
//! An occluder type absent from a frame is written as an empty list (`[]`)
//! rather than omitted; both forms load as `None`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A run-length encoded binary mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mask {
    /// Mask dimensions as `[height, width]`.
    pub size: Vec<u32>,
    /// Hex-encoded RLE counts.
    pub counts: String,
}

impl Mask {
    /// Decode the hex counts into raw RLE bytes.
    ///
    /// Returns `None` if the counts are not valid hex.
    pub fn counts_bytes(&self) -> Option<Vec<u8>> {
        let hex = self.counts.as_bytes();
        if hex.len() % 2 != 0 {
            return None;
        }
        hex.chunks(2)
            .map(|pair| {
                let s = std::str::from_utf8(pair).ok()?;
                u8::from_str_radix(s, 16).ok()
            })
            .collect()
    }
}

/// Occluder categories a mask can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcclusionType {
    /// Union of every occluder.
    All,
    Solid,
    Sparse,
    SemiTransparent,
    Transparent,
}

impl OcclusionType {
    /// Short key used in `anno.json`.
    pub fn key(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Solid => "s",
            Self::Sparse => "sp",
            Self::SemiTransparent => "st",
            Self::Transparent => "t",
        }
    }

    /// Parse a short key (`all`, `s`, `sp`, `st`, `t`).
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "all" => Some(Self::All),
            "s" => Some(Self::Solid),
            "sp" => Some(Self::Sparse),
            "st" => Some(Self::SemiTransparent),
            "t" => Some(Self::Transparent),
            _ => None,
        }
    }
}

impl fmt::Display for OcclusionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// All occlusion masks of one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcclusionMasks {
    #[serde(default, deserialize_with = "optional_mask")]
    pub all: Option<Mask>,
    #[serde(default, deserialize_with = "optional_mask")]
    pub s: Option<Mask>,
    #[serde(default, deserialize_with = "optional_mask")]
    pub sp: Option<Mask>,
    #[serde(default, deserialize_with = "optional_mask")]
    pub st: Option<Mask>,
    #[serde(default, deserialize_with = "optional_mask")]
    pub t: Option<Mask>,
}

impl OcclusionMasks {
    /// Composition order for layered rendering.
    ///
    /// Later layers paint over earlier ones, so the most opaque occluders
    /// come last.
    pub const LAYER_ORDER: [OcclusionType; 4] = [
        OcclusionType::Transparent,
        OcclusionType::SemiTransparent,
        OcclusionType::Sparse,
        OcclusionType::Solid,
    ];

    /// Mask for one occluder type, if present in this frame.
    pub fn get(&self, kind: OcclusionType) -> Option<&Mask> {
        match kind {
            OcclusionType::All => self.all.as_ref(),
            OcclusionType::Solid => self.s.as_ref(),
            OcclusionType::Sparse => self.sp.as_ref(),
            OcclusionType::SemiTransparent => self.st.as_ref(),
            OcclusionType::Transparent => self.t.as_ref(),
        }
    }

    /// Present masks in [`LAYER_ORDER`](Self::LAYER_ORDER).
    pub fn layers(&self) -> impl Iterator<Item = (OcclusionType, &Mask)> + '_ {
        Self::LAYER_ORDER
            .iter()
            .filter_map(move |&kind| self.get(kind).map(|m| (kind, m)))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MaskField {
    Mask(Mask),
    Empty(Vec<serde_json::Value>),
    Null(()),
}

fn optional_mask<'de, D>(deserializer: D) -> Result<Option<Mask>, D::Error>
where
    D: Deserializer<'de>,
{
    match MaskField::deserialize(deserializer)? {
        MaskField::Mask(mask) => Ok(Some(mask)),
        MaskField::Empty(items) if items.is_empty() => Ok(None),
        MaskField::Empty(_) => Err(serde::de::Error::custom(
            "expected a mask object or an empty list",
        )),
        MaskField::Null(()) => Ok(None),
    }
}
