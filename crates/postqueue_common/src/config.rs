//! Plugin configuration
//!
//! Optional TOML file, e.g. /etc/mackerel-agent/postqueue.toml:
//!
//! ```toml
//! Prefix = "postfix"
//! PostQueuePath = "/usr/sbin/postqueue"
//!
//! [MsgCategories]
//!   "Connection refused" = "Connection refused"
//! ```
//!
//! Values are resolved per field: command-line flag, then config file, then
//! built-in default. Categories fall back to the defaults only when the file
//! has no `[MsgCategories]` table at all.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::categories::{default_categories, CategoryRegistry};
use crate::error::{PostqueueError, Result};

/// Default metric key prefix
pub const DEFAULT_PREFIX: &str = "postfix";

/// Default location of the postqueue binary
pub const DEFAULT_POSTQUEUE_PATH: &str = "/usr/sbin/postqueue";

/// On-disk configuration file format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Prefix for metric keys
    #[serde(rename = "Prefix", alias = "prefix", default)]
    pub prefix: String,

    /// Path to the postqueue command
    #[serde(
        rename = "PostQueuePath",
        alias = "postqueuepath",
        alias = "post_queue_path",
        default
    )]
    pub postqueue_path: String,

    /// Category name -> regular expression
    #[serde(
        rename = "MsgCategories",
        alias = "msgcategories",
        alias = "msg_categories",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub msg_categories: Option<BTreeMap<String, String>>,
}

impl PluginConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| PostqueueError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::parse(&contents).map_err(|source| PostqueueError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), ?config, "loaded plugin config");
        Ok(config)
    }

    fn parse(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Configuration with every value set to its default
    pub fn template() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            postqueue_path: DEFAULT_POSTQUEUE_PATH.to_string(),
            msg_categories: Some(default_categories()),
        }
    }

    /// Commented TOML for `--generate-config`; categories in name order
    pub fn render_template(&self) -> String {
        let mut out = String::new();
        out.push_str("# Postqueue plugin config file\n");
        out.push_str("# Prefix for metrics\n");
        out.push_str(&format!("Prefix = {}\n\n", toml_string(&self.prefix)));
        out.push_str("# Path to postqueue command\n");
        out.push_str(&format!(
            "PostQueuePath = {}\n\n",
            toml_string(&self.postqueue_path)
        ));
        out.push_str("# Message categories\n");
        out.push_str("# Format: <category> = \"<regex>\"\n");
        out.push_str("# Patterns match case-insensitively, so [A-Z] also matches a-z.\n");
        out.push_str("# Start a pattern with (?-i) to match case-sensitively.\n");
        out.push_str("[MsgCategories]\n");
        if let Some(categories) = &self.msg_categories {
            for (name, pattern) in categories {
                out.push_str(&format!("  {} = {}\n", toml_string(name), toml_string(pattern)));
            }
        }
        out
    }
}

fn toml_string(s: &str) -> String {
    toml::Value::String(s.to_string()).to_string()
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub prefix: Option<String>,
    pub postqueue_path: Option<String>,
}

/// Effective settings after merging flags, file and defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub prefix: String,
    pub postqueue_path: String,
    pub msg_categories: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(None, CliOverrides::default())
    }
}

impl Settings {
    /// Merge command-line flags over the config file over defaults
    pub fn resolve(file: Option<PluginConfig>, cli: CliOverrides) -> Self {
        let file = file.unwrap_or_default();

        let prefix = pick(cli.prefix, file.prefix, DEFAULT_PREFIX);
        let postqueue_path = pick(cli.postqueue_path, file.postqueue_path, DEFAULT_POSTQUEUE_PATH);
        let msg_categories = file.msg_categories.unwrap_or_else(default_categories);

        Self {
            prefix,
            postqueue_path,
            msg_categories,
        }
    }

    /// Reject settings that cannot produce a collection.
    ///
    /// Categories are checked after compilation, so a table holding only
    /// skipped entries (empty name or pattern, reserved `queue` key) counts
    /// as empty.
    pub fn validate(&self) -> Result<()> {
        if self.postqueue_path.is_empty() {
            return Err(PostqueueError::Validation(
                "postqueue path is required".to_string(),
            ));
        }
        if self.registry()?.is_empty() {
            return Err(PostqueueError::Validation(
                "message categories is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Compile the configured categories
    pub fn registry(&self) -> Result<CategoryRegistry> {
        CategoryRegistry::build(&self.msg_categories)
    }
}

fn pick(flag: Option<String>, file: String, default: &str) -> String {
    match flag {
        Some(v) if !v.is_empty() => v,
        _ if !file.is_empty() => file,
        _ => default.to_string(),
    }
}
