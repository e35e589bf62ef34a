//! One plugin invocation: resolve settings, collect, print.

use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use postqueue_common::{PluginConfig, PostqueueError, PostqueuePlugin, Settings};
use tracing::debug;

use crate::cli::Cli;

/// Run the plugin for `cli`, writing agent output to `out`.
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<()> {
    if cli.generate_config {
        out.write_all(PluginConfig::template().render_template().as_bytes())
            .context("Failed to write config template")?;
        return Ok(());
    }

    let file_config = match &cli.config {
        Some(path) => Some(PluginConfig::load(path).context("Failed to load config file")?),
        None => None,
    };

    let settings = Settings::resolve(file_config, cli.overrides());
    debug!(?settings, "resolved settings");
    settings.validate().context("Failed to validate config")?;

    let mut plugin = PostqueuePlugin::new(&settings).context("Failed to build message categories")?;

    if let Some(input) = &cli.input {
        let listing = fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?;
        plugin = plugin.with_output(listing);
    }

    plugin.run(out).context("Failed to collect postqueue metrics")?;
    Ok(())
}

/// Error class for the failure log line; `internal` when the cause did not
/// come from the plugin library.
pub fn error_kind(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<PostqueueError>()
        .map_or("internal", |e| e.kind().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::NamedTempFile;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["mppostqueue"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_generate_config() {
        let mut out = Vec::new();
        run(&cli(&["--generate-config"]), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Prefix = \"postfix\""));
        assert!(text.contains("PostQueuePath = \"/usr/sbin/postqueue\""));
        assert!(text.contains("[MsgCategories]"));
    }

    #[test]
    fn test_missing_config_file() {
        let mut out = Vec::new();
        let err = run(&cli(&["--config", "/nonexistent/postqueue.toml"]), &mut out).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load config file"));
        assert!(matches!(
            err.downcast_ref::<PostqueueError>(),
            Some(PostqueueError::ConfigRead { .. })
        ));
    }

    #[test]
    fn test_error_kind() {
        let err = run(&cli(&["--config", "/nonexistent/postqueue.toml"]), &mut Vec::new()).unwrap_err();
        assert_eq!(error_kind(&err), "config");

        let err = run(&cli(&["--path", "/nonexistent/postqueue-binary"]), &mut Vec::new()).unwrap_err();
        assert_eq!(error_kind(&err), "external_command");

        assert_eq!(error_kind(&anyhow::anyhow!("stdout closed")), "internal");
    }

    #[test]
    fn test_empty_categories_fail_validation() {
        let mut config = NamedTempFile::new().unwrap();
        writeln!(config, "[MsgCategories]").unwrap();

        let path = config.path().to_str().unwrap().to_string();
        let err = run(&cli(&["--config", &path]), &mut Vec::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PostqueueError>(),
            Some(PostqueueError::Validation(_))
        ));
    }

    #[test]
    fn test_input_file() {
        let mut listing = NamedTempFile::new().unwrap();
        writeln!(listing, "ABCDEF1234  5678   foo@bar").unwrap();
        writeln!(listing, "(connect to mx[192.0.2.1]:25: Connection refused)").unwrap();

        let path = listing.path().to_str().unwrap().to_string();
        let mut out = Vec::new();
        run(
            &cli(&["--metric-key-prefix", "mx", "--input", &path]),
            &mut out,
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("mx.postqueue.Connection_refused\t1\t"));
        assert!(text.contains("mx.postqueue.queue\t1\t"));
    }
}
