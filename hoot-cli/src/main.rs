//! HOOT CLI - build, publish and download the HOOT dataset.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use hoot::publisher::ArchiveCompression;

use commands::config::ConfigCommands;
use commands::download::DownloadArgs;
use commands::make_archive::MakeArchiveArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Debug, Parser)]
#[command(name = "hoot", version, about = "Build and download the HOOT dataset")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Package a source tree into zip archives and a manifest
    MakeArchive {
        /// Source tree ({class}/{video}/ directories plus root .txt files)
        #[arg(long)]
        src: PathBuf,

        /// Output directory for archives and manifest.json
        #[arg(long)]
        dest: PathBuf,

        /// Dataset version (e.g. 1.0)
        #[arg(long)]
        version: String,

        /// Change log recorded in the manifest
        #[arg(long)]
        change_log: Option<String>,

        /// Remove the output directory and package everything again
        #[arg(long)]
        clean: bool,

        /// Packaging workers (default: config, or one per CPU)
        #[arg(long)]
        workers: Option<usize>,

        /// Archive compression: stored or deflated
        #[arg(long)]
        compression: Option<ArchiveCompression>,

        /// Comma-separated extensions to include (e.g. .png,.json)
        #[arg(long)]
        extensions: Option<String>,
    },

    /// Download a published dataset
    Download {
        /// Destination directory
        #[arg(long)]
        dest: PathBuf,

        /// Released dataset to fetch (e.g. v1_0-HD, v1_0-UHD)
        #[arg(long)]
        release: Option<String>,

        /// Base URL or local directory, overriding --release
        #[arg(long)]
        url: Option<String>,

        /// Only videos in the test split
        #[arg(long)]
        test_only: bool,

        /// Only videos outside the test split
        #[arg(long)]
        train_only: bool,

        /// Only videos of this class
        #[arg(long)]
        class: Option<String>,

        /// Only videos carrying this tag (e.g. solid)
        #[arg(long)]
        tag: Option<String>,

        /// Unpack archives into {class}/{video}/
        #[arg(long)]
        extract: bool,

        /// Delete archives after unpacking
        #[arg(long, requires = "extract")]
        remove_archives: bool,

        /// Download again even when archives exist
        #[arg(long)]
        clean: bool,

        /// Concurrent downloads
        #[arg(long)]
        workers: Option<usize>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Skip content hash verification
        #[arg(long)]
        no_verify: bool,
    },

    /// Verify local archives against the stored manifest
    Verify {
        /// Dataset directory containing manifest.json
        #[arg(long)]
        dest: PathBuf,
    },

    /// View or edit configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        match e.category() {
            Some(category) => eprintln!("error [{}]: {}", category, e),
            None => eprintln!("error: {}", e),
        }
        process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Config { command } = cli.command {
        return commands::config::run(command);
    }

    let runner = CliRunner::new(cli.verbose)?;

    match cli.command {
        Commands::MakeArchive {
            src,
            dest,
            version,
            change_log,
            clean,
            workers,
            compression,
            extensions,
        } => commands::make_archive::run(
            MakeArchiveArgs {
                source: src,
                dest,
                version,
                change_log,
                clean,
                workers,
                compression,
                extensions,
            },
            &runner,
        ),

        Commands::Download {
            dest,
            release,
            url,
            test_only,
            train_only,
            class,
            tag,
            extract,
            remove_archives,
            clean,
            workers,
            timeout,
            no_verify,
        } => commands::download::run(
            DownloadArgs {
                dest,
                release,
                url,
                test_only,
                train_only,
                class,
                tag,
                extract,
                remove_archives,
                clean,
                workers,
                timeout,
                no_verify,
            },
            &runner,
        ),

        Commands::Verify { dest } => commands::verify::run(dest, &runner),

        Commands::Config { .. } => Ok(()),
    }
}
