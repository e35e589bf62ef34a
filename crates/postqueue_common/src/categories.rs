//! Message category registry.
//!
//! A category is a named regular expression tested against each line of
//! `postqueue -p` output. The built-in table covers the delivery failures
//! most often seen in a Postfix deferred queue; installing it is up to the
//! configuration layer, the registry itself has no implicit defaults.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::classifier::{metric_key, QUEUE_KEY};
use crate::error::{PostqueueError, Result};

/// Built-in categories as `(name, pattern)` pairs, in name order.
pub fn default_categories() -> BTreeMap<String, String> {
    [
        ("Connection refused", "Connection refused"),
        ("Connection timeout", "Connection timed out"),
        ("Helo command rejected", "Helo command rejected: Host not found"),
        ("Host not found", "type=MX: Host not found, try again"),
        ("Mailbox full", "Mailbox full"),
        ("Network is unreachable", "Network is unreachable"),
        ("No route to host", "No route to host"),
        (
            "Over quota",
            "The email account that you tried to reach is over quota",
        ),
        ("Relay access denied", "Relay access denied"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name.to_string(), pattern.to_string()))
    .collect()
}

/// A named classification rule.
#[derive(Debug, Clone)]
pub struct Category {
    name: String,
    regex: Regex,
}

impl Category {
    /// Compile a category. Matching is case-insensitive unless the pattern
    /// turns it off with `(?-i)`.
    pub fn new(name: &str, pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| PostqueueError::InvalidPattern {
                category: name.to_string(),
                source,
            })?;

        Ok(Self {
            name: name.to_string(),
            regex,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Substring search; the pattern must anchor itself to match whole lines.
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

/// Immutable set of categories keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    categories: BTreeMap<String, Category>,
}

impl CategoryRegistry {
    /// Build a registry from `(name, pattern)` pairs.
    ///
    /// Pairs with an empty name or pattern are skipped, as are names whose
    /// metric key is the reserved `queue` key. When a name repeats, the last
    /// pair in iteration order wins. An invalid pattern fails the whole build.
    pub fn build<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut categories = BTreeMap::new();

        for (name, pattern) in pairs {
            let (name, pattern) = (name.as_ref(), pattern.as_ref());
            if name.is_empty() || pattern.is_empty() {
                debug!(category = name, pattern, "skipping category with empty name or pattern");
                continue;
            }
            if metric_key(name) == QUEUE_KEY {
                warn!(category = name, "skipping category that would overwrite the reserved queue metric");
                continue;
            }

            let category = Category::new(name, pattern)?;
            if categories.insert(name.to_string(), category).is_some() {
                debug!(category = name, "category redefined, keeping the last definition");
            }
        }

        Ok(Self { categories })
    }

    /// Registry built from [`default_categories`].
    pub fn with_defaults() -> Result<Self> {
        Self::build(default_categories())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.get(name)
    }

    /// Categories in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }
}

impl<'a> IntoIterator for &'a CategoryRegistry {
    type Item = &'a Category;
    type IntoIter = std::collections::btree_map::Values<'a, String, Category>;

    fn into_iter(self) -> Self::IntoIter {
        self.categories.values()
    }
}
