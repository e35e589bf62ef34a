//! Error types for the postqueue plugin.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostqueueError {
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid pattern for category '{category}': {source}")]
    InvalidPattern {
        category: String,
        #[source]
        source: regex::Error,
    },

    #[error(
        "Failed to execute {command}. exit code: {}, stdout: '{stdout}', stderr: '{stderr}'",
        display_exit_code(.exit_code)
    )]
    ExternalCommand {
        command: String,
        /// `None` when the process could not be launched or was killed by a signal
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none".to_string(),
    }
}

/// Broad error class, logged as the `kind` field of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    ExternalCommand,
    Validation,
    Output,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::ExternalCommand => "external_command",
            ErrorKind::Validation => "validation",
            ErrorKind::Output => "output",
        }
    }
}

impl PostqueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PostqueueError::ConfigRead { .. }
            | PostqueueError::ConfigParse { .. }
            | PostqueueError::InvalidPattern { .. } => ErrorKind::Config,
            PostqueueError::ExternalCommand { .. } => ErrorKind::ExternalCommand,
            PostqueueError::Validation(_) => ErrorKind::Validation,
            PostqueueError::Json(_) | PostqueueError::Io(_) => ErrorKind::Output,
        }
    }
}

pub type Result<T> = std::result::Result<T, PostqueueError>;
