//! Released dataset versions and where they are hosted.
//!
//! Each release is a version folder plus an image quality, published under
//! its own base URL:
//!
//! ```text
//! v1_0-HD   -> {host}v1_0/HD/
//! v1_0-UHD  -> {host}v1_0/UHD/
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use super::error::RetrieveError;

/// Host serving the published releases.
pub const DEFAULT_HOST: &str = "http://ilab.usc.edu/hoot/";

/// Releases published so far.
pub const KNOWN_RELEASES: &[&str] = &["v1_0-HD", "v1_0-UHD"];

/// Release downloaded when none is given.
pub const DEFAULT_RELEASE: &str = "v1_0-HD";

fn release_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(v\d+_\d+)-(HD|UHD)$").unwrap())
}

/// Image quality of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    Hd,
    Uhd,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Hd => "HD",
            Quality::Uhd => "UHD",
        }
    }
}

/// A dataset release identifier such as `v1_0-HD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Release {
    version: String,
    quality: Quality,
}

impl Release {
    /// Parse `v{major}_{minor}-{HD|UHD}`.
    pub fn parse(name: &str) -> Result<Self, RetrieveError> {
        let caps = release_pattern()
            .captures(name.trim())
            .ok_or_else(|| RetrieveError::InvalidRelease(name.to_string()))?;
        let quality = match &caps[2] {
            "HD" => Quality::Hd,
            _ => Quality::Uhd,
        };
        Ok(Self {
            version: caps[1].to_string(),
            quality,
        })
    }

    /// Version folder, e.g. `v1_0`.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Whether this release has been published.
    pub fn is_known(&self) -> bool {
        KNOWN_RELEASES.contains(&self.to_string().as_str())
    }

    /// Base URL of this release under `host`.
    pub fn base_url(&self, host: &str) -> String {
        let host = host.trim_end_matches('/');
        format!("{}/{}/{}/", host, self.version, self.quality.as_str())
    }
}

impl FromStr for Release {
    type Err = RetrieveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.version, self.quality.as_str())
    }
}
