//! Queue listing classifier.
//!
//! Turns the text printed by `postqueue -p` into a [`MetricSnapshot`]:
//! one counter per category plus the reserved `queue` counter.
//!
//! Every line is tested against every category, so a single deferred
//! reason that matches two patterns bumps both counters. Queue depth is
//! counted separately from lines that start with a queue ID, e.g.
//!
//! ```text
//! 4F3B21C0A1*    2146 Mon Oct 16 09:12:44  sender@example.com
//! ```

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::categories::CategoryRegistry;

/// Reserved key for the number of queued messages.
pub const QUEUE_KEY: &str = "queue";

/// Shortest line that can hold a queue ID.
const MIN_QUEUE_LINE_LEN: usize = 10;

fn queue_id_regex() -> &'static Regex {
    static QUEUE_ID: OnceLock<Regex> = OnceLock::new();
    QUEUE_ID.get_or_init(|| {
        Regex::new(r"^[0-9A-F]{10,12}\*?\s+").expect("queue id pattern is valid")
    })
}

/// Metric key for a category name: every space becomes an underscore.
pub fn metric_key(category: &str) -> String {
    category.replace(' ', "_")
}

/// Whether `line` starts with a queue ID (10-12 uppercase hex digits,
/// optionally followed by `*`, then whitespace).
pub fn is_queue_line(line: &str) -> bool {
    line.len() >= MIN_QUEUE_LINE_LEN && queue_id_regex().is_match(line)
}

/// Split text on LF, CR or CRLF. A trailing terminator does not yield an
/// extra empty line.
pub fn universal_lines(text: &str) -> UniversalLines<'_> {
    UniversalLines { rest: text }
}

pub struct UniversalLines<'a> {
    rest: &'a str,
}

impl<'a> Iterator for UniversalLines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }

        match self.rest.find(['\r', '\n']) {
            Some(pos) => {
                let line = &self.rest[..pos];
                let skip = if self.rest[pos..].starts_with("\r\n") { 2 } else { 1 };
                self.rest = &self.rest[pos + skip..];
                Some(line)
            }
            None => {
                let line = self.rest;
                self.rest = "";
                Some(line)
            }
        }
    }
}

/// Per-collection counters, keyed by metric key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricSnapshot {
    counts: BTreeMap<String, u64>,
}

impl MetricSnapshot {
    /// Zeroed snapshot for `registry`, including the `queue` key.
    pub fn zeroed(registry: &CategoryRegistry) -> Self {
        let mut counts: BTreeMap<String, u64> = registry
            .names()
            .map(|name| (metric_key(name), 0))
            .collect();
        counts.insert(QUEUE_KEY.to_string(), 0);
        Self { counts }
    }

    fn increment(&mut self, key: &str) {
        if let Some(count) = self.counts.get_mut(key) {
            *count += 1;
        } else {
            self.counts.insert(key.to_string(), 1);
        }
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.counts.get(key).copied()
    }

    /// Value of the `queue` counter.
    pub fn queue(&self) -> u64 {
        self.get(QUEUE_KEY).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `(key, count)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn as_map(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    pub fn into_map(self) -> BTreeMap<String, u64> {
        self.counts
    }
}

/// Classify a queue listing against `registry`.
pub fn classify(output: &str, registry: &CategoryRegistry) -> MetricSnapshot {
    let mut snapshot = MetricSnapshot::zeroed(registry);
    // Keys are derived once per call rather than once per line.
    let keyed: Vec<_> = registry
        .iter()
        .map(|category| (category, metric_key(category.name())))
        .collect();

    for line in universal_lines(output) {
        for (category, key) in &keyed {
            if category.is_match(line) {
                trace!(category = category.name(), line, "category matched");
                snapshot.increment(key);
            }
        }

        if is_queue_line(line) {
            snapshot.increment(QUEUE_KEY);
        }
    }

    debug!(metrics = ?snapshot.as_map(), "classified queue listing");
    snapshot
}
