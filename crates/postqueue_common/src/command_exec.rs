//! Queue listing command execution
//!
//! Runs the queue-listing command (`postqueue -p` by default) and captures
//! exit code, stdout, stderr and duration. A launch failure or a non-zero
//! exit is an error for the whole collection; there is no retry and no
//! timeout at this layer.

use std::process::Command;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::{PostqueueError, Result};

/// Arguments passed to postqueue to print the queue listing
pub const DEFAULT_ARGS: &[&str] = &["-p"];

/// Captured result of a successful command run
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Full command line that was executed
    pub full_command: String,
    /// Exit code (0 on success)
    pub exit_code: i32,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Execution duration
    pub duration_ms: u64,
}

/// Something that can produce a queue listing.
///
/// The plugin talks to this trait so tests can feed canned output.
pub trait QueueSource {
    fn fetch(&self) -> Result<String>;
}

/// Runs a program with fixed arguments.
#[derive(Debug, Clone)]
pub struct CommandExec {
    program: String,
    args: Vec<String>,
}

impl CommandExec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// `<path> -p`
    pub fn postqueue(path: impl Into<String>) -> Self {
        Self::new(path, DEFAULT_ARGS)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn full_command(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Execute the command, failing on launch errors and non-zero exits.
    pub fn execute(&self) -> Result<CommandOutput> {
        let full_command = self.full_command();
        debug!(command = %full_command, "running queue listing command");

        let start = Instant::now();
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| PostqueueError::ExternalCommand {
                command: full_command.clone(),
                exit_code: None,
                stdout: String::new(),
                stderr: format!("OS error: {}", e),
            })?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(PostqueueError::ExternalCommand {
                command: full_command,
                exit_code: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(CommandOutput {
            full_command,
            exit_code: output.status.code().unwrap_or(0),
            stdout,
            stderr,
            duration_ms,
        })
    }
}

impl QueueSource for CommandExec {
    /// Stdout of a successful run. Stderr from a successful run is logged
    /// and otherwise ignored.
    fn fetch(&self) -> Result<String> {
        let output = self.execute()?;
        if !output.stderr.trim().is_empty() {
            warn!(
                command = %output.full_command,
                stderr = %output.stderr.trim_end(),
                "queue listing command wrote to stderr"
            );
        }
        debug!(
            command = %output.full_command,
            duration_ms = output.duration_ms,
            bytes = output.stdout.len(),
            "queue listing command finished"
        );
        Ok(output.stdout)
    }
}
