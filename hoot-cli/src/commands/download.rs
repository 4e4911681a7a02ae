//! `hoot download`: fetch a published dataset.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hoot::config::{format_size, ConfigFile};
use hoot::retriever::{
    DownloadOptions, FileTransport, Release, Retriever, Selector, DEFAULT_HOST,
};

use tracing::warn;

use crate::error::CliError;
use crate::runner::{progress_bar, CliRunner};

/// Arguments for the download command.
pub struct DownloadArgs {
    pub dest: PathBuf,
    pub release: Option<String>,
    pub url: Option<String>,
    pub test_only: bool,
    pub train_only: bool,
    pub class: Option<String>,
    pub tag: Option<String>,
    pub extract: bool,
    pub remove_archives: bool,
    pub clean: bool,
    pub workers: Option<usize>,
    pub timeout: Option<u64>,
    pub no_verify: bool,
}

/// Where to download from: `--url` > `--release` > config.
pub fn resolve_base_url(
    url: Option<String>,
    release: Option<&str>,
    config: &ConfigFile,
) -> Result<String, CliError> {
    if let Some(url) = url {
        return Ok(url);
    }
    match release {
        Some(name) => {
            let release = Release::parse(name)?;
            if !release.is_known() {
                warn!(release = %release, "Release is not a known published version");
            }
            Ok(release.base_url(DEFAULT_HOST))
        }
        None => Ok(config.download.base_url.clone()),
    }
}

/// Combine the selection flags into one selector.
pub fn build_selector(
    test_only: bool,
    train_only: bool,
    class: Option<String>,
    tag: Option<String>,
) -> Result<Selector, CliError> {
    if test_only && train_only {
        return Err(CliError::Config(
            "--test-only and --train-only cannot be combined".to_string(),
        ));
    }
    let mut parts = Vec::new();
    if test_only {
        parts.push(Selector::TestSplit);
    }
    if train_only {
        parts.push(Selector::TrainSplit);
    }
    parts.extend(class.map(Selector::Class));
    parts.extend(tag.map(Selector::Tag));
    Ok(Selector::all_of(parts))
}

pub fn run(args: DownloadArgs, runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("download");
    let config = runner.config();

    let base_url = resolve_base_url(args.url, args.release.as_deref(), config)?;
    let options = DownloadOptions {
        selector: build_selector(args.test_only, args.train_only, args.class, args.tag)?,
        clean: args.clean,
        extract: args.extract,
        remove_archives: args.remove_archives,
        workers: args.workers.unwrap_or(config.download.workers),
        verify_checksums: config.download.verify_checksums && !args.no_verify,
    };
    let timeout = Duration::from_secs(args.timeout.unwrap_or(config.download.timeout_secs));

    let retriever = match local_mirror(&base_url) {
        Some(root) => Retriever::new(FileTransport::new(root)),
        None => Retriever::http(&base_url, timeout)?,
    };

    println!("Source:      {}", base_url);
    println!("Destination: {}", args.dest.display());
    println!("Selection:   {}", options.selector);
    println!();

    let (bar, progress) = progress_bar("Downloading");
    let retriever = retriever
        .with_cancellation(runner.cancellation_on_interrupt())
        .with_progress(progress);
    let result = retriever.retrieve(&args.dest, &options);
    bar.finish_and_clear();
    let (manifest, report) = result?;

    println!("Dataset {} ({} videos listed)", manifest.version, manifest.entry_count());
    println!("  Selected:    {}", report.selected);
    println!("  Downloaded:  {} ({})", report.downloaded, format_size(report.bytes_downloaded));
    println!("  Skipped:     {}", report.skipped);
    if args.extract {
        println!("  Extracted:   {}", report.extracted);
    }

    if report.has_failures() {
        eprintln!();
        eprintln!("Failed videos:");
        for failure in &report.failures {
            eprintln!("  {}", failure);
        }
    }

    if report.is_complete() {
        Ok(())
    } else {
        Err(CliError::DownloadIncomplete {
            failed: report.failure_count(),
            cancelled: report.cancelled,
        })
    }
}

/// Local directory named by a `file://` URL or a plain path.
fn local_mirror(base_url: &str) -> Option<&Path> {
    if let Some(path) = base_url.strip_prefix("file://") {
        return Some(Path::new(path));
    }
    let path = Path::new(base_url);
    path.is_dir().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_from_flags() {
        assert_eq!(build_selector(false, false, None, None).unwrap(), Selector::All);
        assert_eq!(
            build_selector(true, false, Some("apple".to_string()), None).unwrap(),
            Selector::And(vec![Selector::TestSplit, Selector::Class("apple".to_string())])
        );
        assert!(build_selector(true, true, None, None).is_err());
    }

    #[test]
    fn test_base_url_precedence() {
        let config = ConfigFile::default();

        let explicit =
            resolve_base_url(Some("http://mirror/".to_string()), Some("v1_0-UHD"), &config);
        assert_eq!(explicit.unwrap(), "http://mirror/");

        let release = resolve_base_url(None, Some("v1_0-UHD"), &config).unwrap();
        assert_eq!(release, "http://ilab.usc.edu/hoot/v1_0/UHD/");

        let configured = resolve_base_url(None, None, &config).unwrap();
        assert_eq!(configured, config.download.base_url);

        assert!(resolve_base_url(None, Some("v9"), &config).is_err());
    }

    #[test]
    fn test_local_mirror() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().to_str().unwrap();
        assert_eq!(local_mirror(dir), Some(temp.path()));
        assert_eq!(local_mirror("file:///srv/hoot"), Some(Path::new("/srv/hoot")));
        assert_eq!(local_mirror("http://ilab.usc.edu/hoot/"), None);
    }
}
