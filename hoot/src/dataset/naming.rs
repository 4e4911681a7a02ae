//! Naming conventions shared by the publisher and the retriever.
//!
//! Destination layout:
//!
//! ```text
//! {root}/manifest.json
//! {root}/LICENSE.txt, test.txt, train.txt
//! {root}/{class}/{video}.zip
//! {root}/{class}/.hoot.{class}.{video}.{sha256}.{size}
//! ```

use std::sync::OnceLock;

use regex::Regex;

/// Filename of the published manifest at the destination root.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Root file listing the `{class}-{video}` keys of the test split.
pub const TEST_SPLIT_FILENAME: &str = "test.txt";

fn class_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([a-z]+_)*[a-z]+$").unwrap())
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[vV]?(\d+)\.(\d+)$").unwrap())
}

/// Check that a class name is lowercase letters separated by single underscores.
///
/// # Examples
///
/// ```
/// use hoot::dataset::is_valid_class_name;
///
/// assert!(is_valid_class_name("apple"));
/// assert!(is_valid_class_name("toy_car"));
/// assert!(!is_valid_class_name("Apple"));
/// assert!(!is_valid_class_name("toy__car"));
/// assert!(!is_valid_class_name("_apple"));
/// ```
pub fn is_valid_class_name(name: &str) -> bool {
    class_name_pattern().is_match(name)
}

/// Check that a video id can be embedded in marker names and archive paths.
///
/// Ids are directory names; they must be non-empty and free of dots, path
/// separators and whitespace so a marker name splits unambiguously.
pub fn is_valid_item_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Check a dataset version string such as `1.0` or `v2.1`.
pub fn is_valid_version(version: &str) -> bool {
    version_pattern().is_match(version)
}

/// Archive filename for a video (`001` -> `001.zip`).
pub fn archive_filename(item_id: &str) -> String {
    format!("{}.zip", item_id)
}

/// Manifest path of a video's archive, relative to the dataset root.
pub fn archive_relative_path(class: &str, item_id: &str) -> String {
    format!("{}/{}", class, archive_filename(item_id))
}

/// Check that a name from a manifest is a plain file name.
///
/// Rejects empty names, `.`/`..`, and anything containing a path separator,
/// so joining it onto a local directory can never escape that directory.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// Key used in the split files (`apple`, `001` -> `apple-001`).
pub fn split_key(class: &str, item_id: &str) -> String {
    format!("{}-{}", class, item_id)
}
