//! `hoot config`: inspect and edit `config.ini`.
//!
//! Keys are addressed as `section.key`. Every value is validated against its
//! type before the file is rewritten, so a bad `set` never reaches disk.

use std::fmt::Write as _;

use clap::Subcommand;
use hoot::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config sections in file order, with the command each one drives.
const SECTIONS: &[(&str, &str)] = &[
    ("build", "hoot make-archive"),
    ("download", "hoot download"),
    ("logging", "all commands"),
];

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one value (e.g. download.workers)
    Get { key: String },

    /// Validate and store a value
    Set { key: String, value: String },

    /// Restore a key to its built-in default
    Reset { key: String },

    /// Show the [build], [download] and [logging] sections
    List {
        /// Only this section
        #[arg(long)]
        section: Option<String>,

        /// Only keys that differ from their default
        #[arg(long)]
        changed: bool,
    },

    /// Print the config file location
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => {
            let key = lookup(&key)?;
            let config = ConfigFile::load()?;
            println!("{}", display_value(&key.get(&config)));
        }
        ConfigCommands::Set { key, value } => {
            let key = lookup(&key)?;
            let mut config = ConfigFile::load()?;
            key.set(&mut config, &value)
                .map_err(|e| CliError::Config(e.to_string()))?;
            config.save()?;
            println!("{} = {}", key, display_value(&key.get(&config)));
        }
        ConfigCommands::Reset { key } => {
            let key = lookup(&key)?;
            let mut config = ConfigFile::load()?;
            key.reset(&mut config);
            config.save()?;
            println!("{} = {} (default)", key, display_value(&key.get(&config)));
        }
        ConfigCommands::List { section, changed } => {
            if let Some(name) = section.as_deref() {
                if !SECTIONS.iter().any(|(s, _)| *s == name) {
                    return Err(CliError::Config(format!(
                        "Unknown section '{}'. Sections are build, download and logging.",
                        name
                    )));
                }
            }
            let config = ConfigFile::load()?;
            let path = config_file_path();
            let origin = if path.exists() { "" } else { " (not created, showing defaults)" };
            println!("# {}{}", path.display(), origin);
            print!("{}", render(&config, section.as_deref(), changed));
        }
        ConfigCommands::Path => println!("{}", config_file_path().display()),
    }
    Ok(())
}

fn lookup(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        let known: Vec<_> = ConfigKey::all().iter().map(|k| k.name()).collect();
        CliError::Config(format!(
            "Unknown configuration key '{}'. Known keys: {}",
            key,
            known.join(", ")
        ))
    })
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(unset)"
    } else {
        value
    }
}

/// Render sections as INI-like text. Changed keys are starred and every key
/// carries the values it accepts.
fn render(config: &ConfigFile, only: Option<&str>, changed_only: bool) -> String {
    let mut out = String::new();

    for (section, used_by) in SECTIONS {
        if only.is_some_and(|s| s != *section) {
            continue;
        }
        let keys: Vec<_> = ConfigKey::all()
            .iter()
            .filter(|k| k.section() == *section)
            .filter(|k| !changed_only || !k.is_default(config))
            .collect();
        if keys.is_empty() {
            continue;
        }

        let _ = writeln!(out, "\n[{}]  ; {}", section, used_by);
        let width = keys.iter().map(|k| k.key_name().len()).max().unwrap_or(0);
        for key in keys {
            let mark = if key.is_default(config) { ' ' } else { '*' };
            let _ = writeln!(
                out,
                "{} {:<width$} = {}",
                mark,
                key.key_name(),
                display_value(&key.get(config)),
                width = width
            );
            let _ = writeln!(out, "  {:<width$}   ; {}", "", key.expects(), width = width);
        }
    }

    if out.is_empty() {
        out.push_str("\n(all settings at their defaults)\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_shows_every_section_with_accepted_values() {
        let text = render(&ConfigFile::default(), None, false);

        let build = text.find("[build]").unwrap();
        let download = text.find("[download]").unwrap();
        let logging = text.find("[logging]").unwrap();
        assert!(build < download && download < logging);
        assert!(text.contains("; hoot make-archive"));
        assert!(text.contains("; stored or deflated"));
        assert!(text.contains("; true or false"));
        assert!(!text.lines().any(|l| l.starts_with('*')));
    }

    #[test]
    fn test_render_marks_and_filters_changed_keys() {
        let mut config = ConfigFile::default();
        ConfigKey::DownloadTimeoutSecs.set(&mut config, "30").unwrap();

        let text = render(&config, None, true);
        assert!(text.contains("[download]"));
        assert!(!text.contains("[build]"));
        assert!(text.lines().any(|l| l.starts_with("* timeout_secs") && l.ends_with("= 30")));
        assert!(!text.contains("workers"));
    }

    #[test]
    fn test_render_single_section() {
        let text = render(&ConfigFile::default(), Some("logging"), false);
        assert!(text.contains("[logging]"));
        assert!(!text.contains("[download]"));
        assert!(text.contains("directory = (unset)"));
    }

    #[test]
    fn test_render_nothing_changed() {
        let text = render(&ConfigFile::default(), None, true);
        assert!(text.contains("(all settings at their defaults)"));
    }

    #[test]
    fn test_lookup_lists_known_keys() {
        assert_eq!(lookup("Download.Workers").unwrap(), ConfigKey::DownloadWorkers);
        let err = lookup("download.speed").unwrap_err().to_string();
        assert!(err.contains("download.speed"));
        assert!(err.contains("logging.level"));
    }
}
