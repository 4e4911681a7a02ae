//! Configuration file support.
//!
//! Settings live in an INI file at `~/.config/hoot/config.ini` (or the
//! platform equivalent). A missing file yields defaults; command line
//! arguments override whatever the file says.
//!
//! ```ini
//! [build]
//! workers = 8
//! allowed_extensions = .png,.json,.txt,.info
//! compression = stored
//! change_log = Initial Release
//!
//! [download]
//! base_url = http://ilab.usc.edu/hoot/v1_0/HD/
//! workers = 4
//! timeout_secs = 300
//! verify_checksums = true
//!
//! [logging]
//! level = info
//! directory = /var/log/hoot
//! ```

mod file;
mod keys;

pub use file::{
    config_directory, config_file_path, BuildSettings, ConfigError, ConfigFile,
    DownloadSettings, CONFIG_FILENAME,
};
pub use keys::{ConfigKey, ConfigKeyError};

/// Format a byte count for humans (`1536` -> `1.5 KB`).
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
