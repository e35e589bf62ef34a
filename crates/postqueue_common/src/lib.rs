//! Postfix queue metrics for the Mackerel agent.
//!
//! Runs `postqueue -p`, sorts every line of the listing into user-defined
//! message categories and counts queued messages.

pub mod categories;
pub mod classifier;
pub mod command_exec;
pub mod config;
pub mod error;
pub mod graph;
pub mod plugin;

pub use categories::{default_categories, Category, CategoryRegistry};
pub use classifier::{classify, metric_key, MetricSnapshot, QUEUE_KEY};
pub use command_exec::{CommandExec, CommandOutput, QueueSource};
pub use config::{CliOverrides, PluginConfig, Settings};
pub use error::{ErrorKind, PostqueueError, Result};
pub use plugin::PostqueuePlugin;
