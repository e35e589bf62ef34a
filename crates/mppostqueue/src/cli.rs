//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic. Long flags take the
//! usual `--flag` form; the single-dash spelling older agent configs use
//! (`-metric-key-prefix mx`, `-path=/usr/bin/postqueue`) is rewritten by
//! [`normalize_args`] before clap sees it.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use postqueue_common::CliOverrides;

/// Postfix postqueue plugin for the Mackerel agent
#[derive(Parser, Debug)]
#[command(name = "mppostqueue")]
#[command(about = "Count Postfix queue entries by deferral reason", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Metric key prefix
    #[arg(long, value_name = "PREFIX")]
    pub metric_key_prefix: Option<String>,

    /// Path to postqueue command
    #[arg(long, value_name = "PATH")]
    pub path: Option<String>,

    /// Path to TOML format config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print a config file template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Classify a saved `postqueue -p` listing instead of running the command
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Debug log level
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            prefix: self.metric_key_prefix.clone(),
            postqueue_path: self.path.clone(),
        }
    }
}

/// Turn `-name` / `-name=value` into `--name` / `--name=value` for every
/// long flag `Cli` knows. The program name, short flags, unknown words and
/// anything after `--` pass through untouched.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let command = Cli::command();
    let longs: Vec<&str> = command
        .get_arguments()
        .filter_map(|arg| arg.get_long())
        .chain(["help", "version"])
        .collect();

    let mut out = Vec::new();
    let mut passthrough = false;
    for (i, arg) in args.into_iter().map(Into::into).enumerate() {
        if i == 0 || passthrough {
            out.push(arg);
            continue;
        }
        if arg == "--" {
            passthrough = true;
            out.push(arg);
            continue;
        }

        let rewritten = arg.to_str().and_then(|s| {
            let rest = s.strip_prefix('-').filter(|r| !r.starts_with('-'))?;
            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            longs.contains(&name).then(|| OsString::from(format!("-{}", s)))
        });
        out.push(rewritten.unwrap_or(arg));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "mppostqueue",
            "--metric-key-prefix",
            "mx",
            "--path",
            "/usr/bin/postqueue",
            "--config",
            "/etc/mackerel-agent/postqueue.toml",
            "--debug",
        ])
        .unwrap();

        assert_eq!(cli.metric_key_prefix.as_deref(), Some("mx"));
        assert_eq!(cli.path.as_deref(), Some("/usr/bin/postqueue"));
        assert_eq!(
            cli.config,
            Some(PathBuf::from("/etc/mackerel-agent/postqueue.toml"))
        );
        assert!(cli.debug);
        assert!(!cli.generate_config);

        let overrides = cli.overrides();
        assert_eq!(overrides.prefix.as_deref(), Some("mx"));
        assert_eq!(overrides.postqueue_path.as_deref(), Some("/usr/bin/postqueue"));
    }

    #[test]
    fn test_no_flags() {
        let cli = Cli::try_parse_from(["mppostqueue"]).unwrap();
        assert!(cli.metric_key_prefix.is_none());
        assert!(cli.path.is_none());
        assert!(cli.config.is_none());
        assert!(cli.input.is_none());
    }

    #[test]
    fn test_single_dash_long_flags() {
        let args = normalize_args([
            "mppostqueue",
            "-metric-key-prefix",
            "mx",
            "-path=/usr/bin/postqueue",
            "-debug",
        ]);
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.metric_key_prefix.as_deref(), Some("mx"));
        assert_eq!(cli.path.as_deref(), Some("/usr/bin/postqueue"));
        assert!(cli.debug);
    }

    #[test]
    fn test_normalize_leaves_other_words_alone() {
        let args = normalize_args([
            "mppostqueue",
            "--config",
            "/etc/postqueue.toml",
            "-x",
            "-pathological",
            "--",
            "-debug",
        ]);
        let expected: Vec<OsString> = [
            "mppostqueue",
            "--config",
            "/etc/postqueue.toml",
            "-x",
            "-pathological",
            "--",
            "-debug",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["mppostqueue", "--tempfile", "x"]).is_err());
    }
}
