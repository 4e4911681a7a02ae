//! `hoot make-archive`: package a source tree into a publishable dataset.

use std::path::PathBuf;

use hoot::config::format_size;
use hoot::publisher::{AllowList, ArchiveCompression, BuildOptions, DatasetBuilder, PublishError};

use crate::error::CliError;
use crate::runner::{progress_bar, CliRunner};

/// Arguments for the make-archive command.
pub struct MakeArchiveArgs {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub version: String,
    pub change_log: Option<String>,
    pub clean: bool,
    pub workers: Option<usize>,
    pub compression: Option<ArchiveCompression>,
    pub extensions: Option<String>,
}

pub fn run(args: MakeArchiveArgs, runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("make-archive");
    let config = &runner.config().build;

    // CLI > config
    let options = BuildOptions {
        version: args.version,
        change_log: args.change_log.unwrap_or_else(|| config.change_log.clone()),
        clean: args.clean,
        workers: args.workers.unwrap_or(config.workers),
        allow_list: args
            .extensions
            .map(|list| AllowList::parse(&list))
            .unwrap_or_else(|| config.allowed_extensions.clone()),
        compression: args.compression.unwrap_or(config.compression),
    };

    println!("Source:      {}", args.source.display());
    println!("Destination: {}", args.dest.display());
    println!("Version:     {}", options.version);
    println!("Extensions:  {}", options.allow_list);
    println!();

    let (bar, progress) = progress_bar("Packaging");
    let builder = DatasetBuilder::new(&args.source, &args.dest, options)
        .with_cancellation(runner.cancellation_on_interrupt())
        .with_progress(progress);
    let result = builder.build();
    bar.finish_and_clear();

    let summary = match result {
        Ok(summary) => summary,
        Err(PublishError::PackagingFailed(failures)) => {
            eprintln!("Packaging failed for {} video(s):", failures.len());
            for failure in &failures {
                eprintln!("  {}", failure);
            }
            return Err(PublishError::PackagingFailed(failures).into());
        }
        Err(e) => return Err(e.into()),
    };

    let total_size: u64 = summary.manifest.entries().map(|(_, e)| e.download_size).sum();
    println!("Dataset {} built", summary.manifest.version);
    println!("  Classes:   {}", summary.manifest.class_groups.len());
    println!("  Videos:    {}", summary.manifest.entry_count());
    println!("  Packaged:  {}", summary.packaged);
    println!("  Skipped:   {}", summary.skipped);
    println!("  Size:      {}", format_size(total_size));
    println!("  Manifest:  {}", summary.manifest_path.display());
    Ok(())
}
