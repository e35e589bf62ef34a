//! Postqueue plugin
//!
//! Wires settings, the queue listing source, the classifier and the graph
//! definition together, and writes the Mackerel agent plugin format:
//!
//! - values: `<prefix>.postqueue.<key>\t<count>\t<epoch>` per metric
//! - meta (when `MACKEREL_AGENT_PLUGIN_META` is set): a
//!   `# mackerel-agent-plugin` header followed by the graph JSON

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::categories::CategoryRegistry;
use crate::classifier::{classify, MetricSnapshot};
use crate::command_exec::{CommandExec, QueueSource};
use crate::config::{Settings, DEFAULT_PREFIX};
use crate::error::Result;
use crate::graph::{graph_definition, Graph, GRAPH_NAME};

/// Environment variable the agent sets when it asks for graph metadata
pub const META_ENV: &str = "MACKEREL_AGENT_PLUGIN_META";

const META_HEADER: &str = "# mackerel-agent-plugin";

#[derive(Serialize)]
struct GraphMeta<'a> {
    graphs: BTreeMap<String, &'a Graph>,
}

pub struct PostqueuePlugin {
    prefix: String,
    registry: CategoryRegistry,
    source: Box<dyn QueueSource>,
    /// Listing to classify instead of asking `source`
    output: Option<String>,
}

impl PostqueuePlugin {
    /// Plugin that runs `<postqueue_path> -p`. Fails on an invalid category
    /// pattern.
    pub fn new(settings: &Settings) -> Result<Self> {
        let registry = settings.registry()?;
        debug!(
            prefix = %settings.prefix,
            path = %settings.postqueue_path,
            categories = registry.len(),
            "postqueue plugin configured"
        );
        Ok(Self::with_source(
            &settings.prefix,
            registry,
            Box::new(CommandExec::postqueue(settings.postqueue_path.as_str())),
        ))
    }

    pub fn with_source(prefix: &str, registry: CategoryRegistry, source: Box<dyn QueueSource>) -> Self {
        Self {
            prefix: prefix.to_string(),
            registry,
            source,
            output: None,
        }
    }

    /// Classify `output` instead of running the command
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn metric_key_prefix(&self) -> &str {
        if self.prefix.is_empty() {
            DEFAULT_PREFIX
        } else {
            &self.prefix
        }
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn graph_definition(&self) -> BTreeMap<String, Graph> {
        graph_definition(&self.prefix, &self.registry)
    }

    /// Fetch the queue listing (unless preloaded) and classify it
    pub fn fetch_metrics(&self) -> Result<MetricSnapshot> {
        let snapshot = match &self.output {
            Some(output) => classify(output, &self.registry),
            None => {
                let output = self.source.fetch()?;
                debug!(bytes = output.len(), "fetched queue listing");
                classify(&output, &self.registry)
            }
        };
        Ok(snapshot)
    }

    fn graph_key(&self) -> String {
        format!("{}.{}", self.metric_key_prefix(), GRAPH_NAME)
    }

    /// Value lines for `snapshot`, stamped with `epoch`
    pub fn format_values(&self, snapshot: &MetricSnapshot, epoch: i64) -> String {
        let graph_key = self.graph_key();
        snapshot
            .iter()
            .map(|(key, count)| format!("{}.{}\t{}\t{}\n", graph_key, key, count, epoch))
            .collect()
    }

    /// Graph metadata in agent plugin format
    pub fn format_meta(&self) -> Result<String> {
        let definition = self.graph_definition();
        let graphs = definition
            .iter()
            .map(|(name, graph)| (format!("{}.{}", self.metric_key_prefix(), name), graph))
            .collect();
        let json = serde_json::to_string(&GraphMeta { graphs })?;
        Ok(format!("{}\n{}\n", META_HEADER, json))
    }

    /// Collect once and write the values
    pub fn output_values<W: Write>(&self, out: &mut W, now: DateTime<Utc>) -> Result<()> {
        let snapshot = self.fetch_metrics()?;
        out.write_all(self.format_values(&snapshot, now.timestamp()).as_bytes())?;
        Ok(())
    }

    pub fn output_meta<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(self.format_meta()?.as_bytes())?;
        Ok(())
    }

    /// Entry point for one agent invocation
    pub fn run<W: Write>(&self, out: &mut W) -> Result<()> {
        let meta_requested = std::env::var(META_ENV)
            .map(|v| !v.is_empty())
            .unwrap_or(false);

        if meta_requested {
            self.output_meta(out)
        } else {
            self.output_values(out, Utc::now())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PostqueueError;

    struct Canned(&'static str);

    impl QueueSource for Canned {
        fn fetch(&self) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    impl QueueSource for Failing {
        fn fetch(&self) -> Result<String> {
            Err(PostqueueError::ExternalCommand {
                command: "/usr/sbin/postqueue -p".to_string(),
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "postqueue: fatal: Connection refused".to_string(),
            })
        }
    }

    fn plugin(prefix: &str, source: Box<dyn QueueSource>) -> PostqueuePlugin {
        let registry = CategoryRegistry::build([("Connection refused", "Connection refused")]).unwrap();
        PostqueuePlugin::with_source(prefix, registry, source)
    }

    #[test]
    fn test_metric_key_prefix_defaults() {
        assert_eq!(plugin("", Box::new(Canned(""))).metric_key_prefix(), "postfix");
        assert_eq!(plugin("mx", Box::new(Canned(""))).metric_key_prefix(), "mx");
    }

    #[test]
    fn test_fetch_from_source() {
        let p = plugin(
            "postfix",
            Box::new(Canned("ABCDEF1234  5678   foo@bar\n   (Connection refused)\n")),
        );
        let snapshot = p.fetch_metrics().unwrap();
        assert_eq!(snapshot.get("Connection_refused"), Some(1));
        assert_eq!(snapshot.queue(), 1);
    }

    #[test]
    fn test_preloaded_output_skips_source() {
        let p = plugin("postfix", Box::new(Failing)).with_output("ABCDEF1234  5678   foo@bar");
        let snapshot = p.fetch_metrics().unwrap();
        assert_eq!(snapshot.queue(), 1);
    }

    #[test]
    fn test_source_failure_is_surfaced() {
        let p = plugin("postfix", Box::new(Failing));
        let err = p.fetch_metrics().unwrap_err();
        assert!(matches!(err, PostqueueError::ExternalCommand { exit_code: Some(1), .. }));
    }

    #[test]
    fn test_format_values() {
        let p = plugin("postfix", Box::new(Canned("")));
        let snapshot = p.fetch_metrics().unwrap();
        let text = p.format_values(&snapshot, 1_700_000_000);
        assert_eq!(
            text,
            "postfix.postqueue.Connection_refused\t0\t1700000000\n\
             postfix.postqueue.queue\t0\t1700000000\n"
        );
    }

    #[test]
    fn test_output_values_uses_timestamp() {
        let p = plugin("mail", Box::new(Canned("ABCDEF1234  5678   foo@bar")));
        let now = DateTime::<Utc>::from_timestamp(1_700_000_123, 0).unwrap();
        let mut out = Vec::new();
        p.output_values(&mut out, now).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("mail.postqueue.queue\t1\t1700000123\n"));
    }

    #[test]
    fn test_format_meta() {
        let p = plugin("postfix", Box::new(Canned("")));
        let meta = p.format_meta().unwrap();
        let (header, json) = meta.split_once('\n').unwrap();
        assert_eq!(header, "# mackerel-agent-plugin");

        let value: serde_json::Value = serde_json::from_str(json.trim()).unwrap();
        let graph = &value["graphs"]["postfix.postqueue"];
        assert_eq!(graph["label"], "Postfix postqueue");
        assert_eq!(graph["unit"], "integer");
        assert_eq!(graph["metrics"][0]["name"], "Connection_refused");
        assert_eq!(graph["metrics"][0]["label"], "Connection refused");
        assert_eq!(graph["metrics"][1]["name"], "queue");
    }
}
