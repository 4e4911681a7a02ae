//! Filters choosing which videos to download.

use std::fmt;

use crate::dataset::ManifestEntry;

/// Predicate over manifest entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selector {
    /// Every video.
    #[default]
    All,
    /// Videos in the test split.
    TestSplit,
    /// Videos not in the test split.
    TrainSplit,
    /// Videos of one class.
    Class(String),
    /// Videos carrying a tag, e.g. `solid`.
    Tag(String),
    /// Videos matching every inner selector.
    And(Vec<Selector>),
}

impl Selector {
    /// Whether the entry of `class` is selected.
    pub fn matches(&self, class: &str, entry: &ManifestEntry) -> bool {
        match self {
            Selector::All => true,
            Selector::TestSplit => entry.test_split,
            Selector::TrainSplit => !entry.test_split,
            Selector::Class(name) => name == class,
            Selector::Tag(tag) => entry.has_tag(tag),
            Selector::And(inner) => inner.iter().all(|s| s.matches(class, entry)),
        }
    }

    /// Combine with another selector; both must match.
    pub fn and(self, other: Selector) -> Selector {
        match (self, other) {
            (Selector::All, s) | (s, Selector::All) => s,
            (Selector::And(mut a), Selector::And(b)) => {
                a.extend(b);
                Selector::And(a)
            }
            (Selector::And(mut a), s) | (s, Selector::And(mut a)) => {
                a.push(s);
                Selector::And(a)
            }
            (a, b) => Selector::And(vec![a, b]),
        }
    }

    /// Conjunction of all `selectors`; empty means [`Selector::All`].
    pub fn all_of(selectors: impl IntoIterator<Item = Selector>) -> Selector {
        selectors.into_iter().fold(Selector::All, Selector::and)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => write!(f, "all"),
            Selector::TestSplit => write!(f, "test split"),
            Selector::TrainSplit => write!(f, "train split"),
            Selector::Class(name) => write!(f, "class {}", name),
            Selector::Tag(tag) => write!(f, "tag {}", tag),
            Selector::And(inner) => {
                let parts: Vec<String> = inner.iter().map(|s| s.to_string()).collect();
                write!(f, "{}", parts.join(" and "))
            }
        }
    }
}
