//! Loading and saving `config.ini`.

use std::fs;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::logging::LoggingConfig;
use crate::publisher::{AllowList, ArchiveCompression, DEFAULT_CHANGE_LOG};
use crate::retriever::{Release, DEFAULT_HOST, DEFAULT_RELEASE, DEFAULT_TIMEOUT_SECS};

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILENAME: &str = "config.ini";

/// Errors loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {key} in {path}: {value}")]
    InvalidValue {
        path: PathBuf,
        key: String,
        value: String,
    },
}

/// `[build]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSettings {
    pub workers: usize,
    pub allowed_extensions: AllowList,
    pub compression: ArchiveCompression,
    pub change_log: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            allowed_extensions: AllowList::default(),
            compression: ArchiveCompression::default(),
            change_log: DEFAULT_CHANGE_LOG.to_string(),
        }
    }
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSettings {
    pub base_url: String,
    pub workers: usize,
    pub timeout_secs: u64,
    pub verify_checksums: bool,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        let base_url = Release::parse(DEFAULT_RELEASE)
            .map(|r| r.base_url(DEFAULT_HOST))
            .unwrap_or_else(|_| DEFAULT_HOST.to_string());
        Self {
            base_url,
            workers: 4,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verify_checksums: true,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub build: BuildSettings,
    pub download: DownloadSettings,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini, path)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|e| ConfigError::Write {
                path: path.to_path_buf(),
                source: e,
            })
    }

    fn from_ini(ini: &Ini, path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let invalid = |key: &str, value: &str| ConfigError::InvalidValue {
            path: path.to_path_buf(),
            key: key.to_string(),
            value: value.to_string(),
        };

        if let Some(section) = ini.section(Some("build")) {
            if let Some(v) = section.get("workers") {
                config.build.workers = v.trim().parse().map_err(|_| invalid("build.workers", v))?;
            }
            if let Some(v) = section.get("allowed_extensions") {
                config.build.allowed_extensions = AllowList::parse(v);
            }
            if let Some(v) = section.get("compression") {
                config.build.compression = v.parse().map_err(|_| invalid("build.compression", v))?;
            }
            if let Some(v) = section.get("change_log") {
                config.build.change_log = v.to_string();
            }
        }

        if let Some(section) = ini.section(Some("download")) {
            if let Some(v) = section.get("base_url") {
                config.download.base_url = v.trim().to_string();
            }
            if let Some(v) = section.get("workers") {
                config.download.workers =
                    v.trim().parse().map_err(|_| invalid("download.workers", v))?;
            }
            if let Some(v) = section.get("timeout_secs") {
                config.download.timeout_secs =
                    v.trim().parse().map_err(|_| invalid("download.timeout_secs", v))?;
            }
            if let Some(v) = section.get("verify_checksums") {
                config.download.verify_checksums =
                    parse_bool(v).ok_or_else(|| invalid("download.verify_checksums", v))?;
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(v) = section.get("level") {
                config.logging.level = v.trim().to_string();
            }
            if let Some(v) = section.get("directory") {
                let v = v.trim();
                config.logging.directory = (!v.is_empty()).then(|| PathBuf::from(v));
            }
        }

        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("build"))
            .set("workers", self.build.workers.to_string())
            .set("allowed_extensions", self.build.allowed_extensions.to_string())
            .set("compression", self.build.compression.as_str())
            .set("change_log", self.build.change_log.as_str());
        ini.with_section(Some("download"))
            .set("base_url", self.download.base_url.as_str())
            .set("workers", self.download.workers.to_string())
            .set("timeout_secs", self.download.timeout_secs.to_string())
            .set("verify_checksums", self.download.verify_checksums.to_string());
        ini.with_section(Some("logging"))
            .set("level", self.logging.level.as_str());
        if let Some(dir) = &self.logging.directory {
            ini.with_section(Some("logging"))
                .set("directory", dir.display().to_string());
        }
        ini
    }
}

/// Directory holding HOOT configuration.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hoot")
}

/// Path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILENAME)
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
