//! Shared setup for commands: configuration, logging and Ctrl-C handling.

use hoot::batch::{BatchProgressCallback, CancellationToken};
use hoot::config::ConfigFile;
use hoot::logging::{init_logging, LoggingGuard};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::error::CliError;

/// Owns the loaded configuration and the logging guard for a command run.
pub struct CliRunner {
    config: ConfigFile,
    _logging: LoggingGuard,
}

impl CliRunner {
    pub fn new(verbose: bool) -> Result<Self, CliError> {
        let (config, config_error) = match ConfigFile::load() {
            Ok(config) => (config, None),
            Err(e) => (ConfigFile::default(), Some(e)),
        };

        let mut logging = config.logging.clone();
        if verbose {
            logging.level = "debug".to_string();
        }
        let guard = init_logging(&logging)?;

        if let Some(e) = config_error {
            warn!(error = %e, "Ignoring unreadable config file");
        }

        Ok(Self {
            config,
            _logging: guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(command, version = env!("CARGO_PKG_VERSION"), "hoot starting");
    }

    /// Token cancelled by the first Ctrl-C.
    pub fn cancellation_on_interrupt(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let handler_token = token.clone();
        let installed = ctrlc::set_handler(move || {
            if !handler_token.is_cancelled() {
                eprintln!("\nInterrupted: finishing videos in progress, then stopping...");
            }
            handler_token.cancel();
        });
        if let Err(e) = installed {
            warn!(error = %e, "Could not install Ctrl-C handler");
        }
        token
    }
}

/// Progress bar for a batch of videos, and the callback that drives it.
pub fn progress_bar(label: &str) -> (ProgressBar, BatchProgressCallback) {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{prefix} [{bar:40.cyan/blue}] {pos}/{len} videos ({msg}) {elapsed_precise}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    bar.set_style(style);
    bar.set_prefix(label.to_string());

    let callback_bar = bar.clone();
    let callback: BatchProgressCallback = std::sync::Arc::new(move |done, total, bytes| {
        callback_bar.set_length(total as u64);
        callback_bar.set_position(done as u64);
        callback_bar.set_message(hoot::config::format_size(bytes));
    });
    (bar, callback)
}
