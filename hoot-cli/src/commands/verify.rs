//! `hoot verify`: check a local dataset tree against its manifest.

use std::path::PathBuf;

use hoot::dataset::{verify_archives, Manifest, MANIFEST_FILENAME};

use crate::error::CliError;
use crate::runner::CliRunner;

pub fn run(dest: PathBuf, runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("verify");

    let manifest_path = dest.join(MANIFEST_FILENAME);
    let manifest = Manifest::read_from(&manifest_path)?;

    println!(
        "Verifying {} videos of dataset {} in {}",
        manifest.entry_count(),
        manifest.version,
        dest.display()
    );

    let issues = verify_archives(&manifest, &dest);
    if issues.is_empty() {
        println!("All archives verified.");
        return Ok(());
    }

    for issue in &issues {
        eprintln!("  {}", issue);
    }
    Err(CliError::Verification(issues.len()))
}
