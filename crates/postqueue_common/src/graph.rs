//! Graph definition handed to the monitoring agent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::categories::CategoryRegistry;
use crate::classifier::{metric_key, QUEUE_KEY};
use crate::config::DEFAULT_PREFIX;

/// Graph name under the metric key prefix
pub const GRAPH_NAME: &str = "postqueue";

/// One series in a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMetric {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub stacked: bool,
}

/// A graph: label, unit and its series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub label: String,
    pub unit: String,
    pub metrics: Vec<GraphMetric>,
}

/// Upper-case the first letter of each word, leaving the rest alone.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }
    out
}

/// Graph label for a prefix, e.g. `postfix` -> `Postfix postqueue`.
pub fn graph_label(prefix: &str) -> String {
    let label_prefix = title_case(prefix);
    if label_prefix.is_empty() {
        format!("{} postqueue", title_case(DEFAULT_PREFIX))
    } else {
        format!("{} postqueue", label_prefix)
    }
}

/// Graph definitions keyed by graph name: one series per category in name
/// order, then `queue`.
pub fn graph_definition(prefix: &str, registry: &CategoryRegistry) -> BTreeMap<String, Graph> {
    let mut metrics: Vec<GraphMetric> = Vec::with_capacity(registry.len() + 1);
    for name in registry.names() {
        let key = metric_key(name);
        // Names differing only by spaces vs underscores share one counter.
        if metrics.iter().any(|m| m.name == key) {
            continue;
        }
        metrics.push(GraphMetric {
            name: key,
            label: name.to_string(),
            stacked: false,
        });
    }
    metrics.push(GraphMetric {
        name: QUEUE_KEY.to_string(),
        label: QUEUE_KEY.to_string(),
        stacked: false,
    });

    let mut graphs = BTreeMap::new();
    graphs.insert(
        GRAPH_NAME.to_string(),
        Graph {
            label: graph_label(prefix),
            unit: "integer".to_string(),
            metrics,
        },
    );
    graphs
}
