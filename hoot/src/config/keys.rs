//! Typed `section.key` access used by `hoot config get/set/list`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use super::file::{parse_bool, ConfigFile};
use crate::publisher::AllowList;

/// Errors from key lookup or value validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigKeyError {
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// A settable configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BuildWorkers,
    BuildAllowedExtensions,
    BuildCompression,
    BuildChangeLog,
    DownloadBaseUrl,
    DownloadWorkers,
    DownloadTimeoutSecs,
    DownloadVerifyChecksums,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::BuildWorkers,
            ConfigKey::BuildAllowedExtensions,
            ConfigKey::BuildCompression,
            ConfigKey::BuildChangeLog,
            ConfigKey::DownloadBaseUrl,
            ConfigKey::DownloadWorkers,
            ConfigKey::DownloadTimeoutSecs,
            ConfigKey::DownloadVerifyChecksums,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingDirectory,
        ]
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::BuildWorkers => "build.workers",
            ConfigKey::BuildAllowedExtensions => "build.allowed_extensions",
            ConfigKey::BuildCompression => "build.compression",
            ConfigKey::BuildChangeLog => "build.change_log",
            ConfigKey::DownloadBaseUrl => "download.base_url",
            ConfigKey::DownloadWorkers => "download.workers",
            ConfigKey::DownloadTimeoutSecs => "download.timeout_secs",
            ConfigKey::DownloadVerifyChecksums => "download.verify_checksums",
            ConfigKey::LoggingLevel => "logging.level",
            ConfigKey::LoggingDirectory => "logging.directory",
        }
    }

    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or_default()
    }

    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or_default()
    }

    /// Values accepted by [`set`](Self::set).
    pub fn expects(&self) -> &'static str {
        match self {
            ConfigKey::BuildWorkers | ConfigKey::DownloadWorkers => "a positive integer",
            ConfigKey::BuildAllowedExtensions => "a comma-separated extension list",
            ConfigKey::BuildCompression => "stored or deflated",
            ConfigKey::BuildChangeLog => "any text",
            ConfigKey::DownloadBaseUrl => "an http, https or file URL",
            ConfigKey::DownloadTimeoutSecs => "a positive number of seconds",
            ConfigKey::DownloadVerifyChecksums => "true or false",
            ConfigKey::LoggingLevel => "trace, debug, info, warn or error",
            ConfigKey::LoggingDirectory => "a directory, empty for stderr only",
        }
    }

    /// Whether the key holds its built-in default.
    pub fn is_default(&self, config: &ConfigFile) -> bool {
        self.get(config) == self.get(&ConfigFile::default())
    }

    /// Restore the built-in default.
    pub fn reset(&self, config: &mut ConfigFile) {
        let defaults = ConfigFile::default();
        match self {
            ConfigKey::BuildWorkers => config.build.workers = defaults.build.workers,
            ConfigKey::BuildAllowedExtensions => {
                config.build.allowed_extensions = defaults.build.allowed_extensions
            }
            ConfigKey::BuildCompression => config.build.compression = defaults.build.compression,
            ConfigKey::BuildChangeLog => config.build.change_log = defaults.build.change_log,
            ConfigKey::DownloadBaseUrl => config.download.base_url = defaults.download.base_url,
            ConfigKey::DownloadWorkers => config.download.workers = defaults.download.workers,
            ConfigKey::DownloadTimeoutSecs => {
                config.download.timeout_secs = defaults.download.timeout_secs
            }
            ConfigKey::DownloadVerifyChecksums => {
                config.download.verify_checksums = defaults.download.verify_checksums
            }
            ConfigKey::LoggingLevel => config.logging.level = defaults.logging.level,
            ConfigKey::LoggingDirectory => config.logging.directory = defaults.logging.directory,
        }
    }

    /// Current value as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::BuildWorkers => config.build.workers.to_string(),
            ConfigKey::BuildAllowedExtensions => config.build.allowed_extensions.to_string(),
            ConfigKey::BuildCompression => config.build.compression.to_string(),
            ConfigKey::BuildChangeLog => config.build.change_log.clone(),
            ConfigKey::DownloadBaseUrl => config.download.base_url.clone(),
            ConfigKey::DownloadWorkers => config.download.workers.to_string(),
            ConfigKey::DownloadTimeoutSecs => config.download.timeout_secs.to_string(),
            ConfigKey::DownloadVerifyChecksums => config.download.verify_checksums.to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Validate `value` and store it.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        let invalid = || ConfigKeyError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: format!("expected {}", self.expects()),
        };
        let value = value.trim();

        match self {
            ConfigKey::BuildWorkers => config.build.workers = parse_count(value).ok_or_else(invalid)?,
            ConfigKey::BuildAllowedExtensions => {
                let list = AllowList::parse(value);
                if list.extensions().is_empty() {
                    return Err(invalid());
                }
                config.build.allowed_extensions = list;
            }
            ConfigKey::BuildCompression => {
                config.build.compression = value.parse().map_err(|_: String| invalid())?
            }
            ConfigKey::BuildChangeLog => config.build.change_log = value.to_string(),
            ConfigKey::DownloadBaseUrl => {
                if !(value.starts_with("http://")
                    || value.starts_with("https://")
                    || value.starts_with("file://"))
                {
                    return Err(invalid());
                }
                config.download.base_url = value.to_string();
            }
            ConfigKey::DownloadWorkers => {
                config.download.workers = parse_count(value).ok_or_else(invalid)?
            }
            ConfigKey::DownloadTimeoutSecs => {
                config.download.timeout_secs = value
                    .parse::<u64>()
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or_else(invalid)?
            }
            ConfigKey::DownloadVerifyChecksums => {
                config.download.verify_checksums = parse_bool(value).ok_or_else(invalid)?
            }
            ConfigKey::LoggingLevel => {
                if !matches!(
                    value.to_ascii_lowercase().as_str(),
                    "trace" | "debug" | "info" | "warn" | "error"
                ) {
                    return Err(invalid());
                }
                config.logging.level = value.to_ascii_lowercase();
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = (!value.is_empty()).then(|| PathBuf::from(value))
            }
        }
        Ok(())
    }
}

fn parse_count(value: &str) -> Option<usize> {
    value.parse::<usize>().ok().filter(|&n| n > 0)
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|k| k.name() == needle)
            .ok_or_else(|| ConfigKeyError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::ArchiveCompression;

    #[test]
    fn test_parse_known_keys() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
        }
        assert_eq!(
            "Download.Workers".parse::<ConfigKey>().unwrap(),
            ConfigKey::DownloadWorkers
        );
    }

    #[test]
    fn test_parse_unknown_key() {
        assert_eq!(
            "download.speed".parse::<ConfigKey>(),
            Err(ConfigKeyError::UnknownKey("download.speed".to_string()))
        );
    }

    #[test]
    fn test_section_and_key_name() {
        assert_eq!(ConfigKey::DownloadTimeoutSecs.section(), "download");
        assert_eq!(ConfigKey::DownloadTimeoutSecs.key_name(), "timeout_secs");
    }

    #[test]
    fn test_set_then_get() {
        let mut config = ConfigFile::default();

        ConfigKey::DownloadWorkers.set(&mut config, "8").unwrap();
        ConfigKey::BuildCompression.set(&mut config, "deflated").unwrap();
        ConfigKey::DownloadVerifyChecksums.set(&mut config, "false").unwrap();
        ConfigKey::LoggingDirectory.set(&mut config, "/tmp/logs").unwrap();

        assert_eq!(ConfigKey::DownloadWorkers.get(&config), "8");
        assert_eq!(config.build.compression, ArchiveCompression::Deflated);
        assert_eq!(ConfigKey::DownloadVerifyChecksums.get(&config), "false");
        assert_eq!(ConfigKey::LoggingDirectory.get(&config), "/tmp/logs");

        ConfigKey::LoggingDirectory.set(&mut config, "").unwrap();
        assert_eq!(ConfigKey::LoggingDirectory.get(&config), "");
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = ConfigFile::default();

        assert!(ConfigKey::DownloadWorkers.set(&mut config, "0").is_err());
        assert!(ConfigKey::BuildWorkers.set(&mut config, "lots").is_err());
        assert!(ConfigKey::BuildCompression.set(&mut config, "bzip2").is_err());
        assert!(ConfigKey::DownloadVerifyChecksums.set(&mut config, "maybe").is_err());
        assert!(ConfigKey::DownloadBaseUrl.set(&mut config, "ftp://x").is_err());
        assert!(ConfigKey::LoggingLevel.set(&mut config, "loud").is_err());
        assert!(ConfigKey::BuildAllowedExtensions.set(&mut config, " , ").is_err());
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_invalid_value_names_accepted_values() {
        let mut config = ConfigFile::default();
        let err = ConfigKey::BuildCompression
            .set(&mut config, "bzip2")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value 'bzip2' for build.compression: expected stored or deflated"
        );
    }

    #[test]
    fn test_reset_restores_default() {
        let mut config = ConfigFile::default();
        ConfigKey::DownloadTimeoutSecs.set(&mut config, "12").unwrap();
        ConfigKey::LoggingDirectory.set(&mut config, "/tmp/logs").unwrap();
        assert!(!ConfigKey::DownloadTimeoutSecs.is_default(&config));
        assert!(ConfigKey::DownloadWorkers.is_default(&config));

        for key in ConfigKey::all() {
            key.reset(&mut config);
        }

        assert_eq!(config, ConfigFile::default());
        assert!(ConfigKey::all().iter().all(|k| k.is_default(&config)));
    }
}
