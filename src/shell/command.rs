//! Process execution.

use crate::error::{ProvisionError, Result};
use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Result of executing an external program.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether the program succeeded (exit code 0).
    pub success: bool,
}

impl CommandResult {
    /// Create a success result.
    pub fn success(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: Some(0),
            stdout,
            stderr,
            duration,
            success: true,
        }
    }

    /// Create a failure result.
    pub fn failure(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            success: false,
        }
    }
}

/// Options for program execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Environment variables (merged with the inherited environment).
    pub env: HashMap<String, String>,

    /// Bytes written to the program's standard input.
    pub stdin: Option<Vec<u8>>,
}

/// Spawns external programs and captures their output.
///
/// Returns `Err` only when the program cannot be spawned at all. A
/// program that runs and exits non-zero yields `Ok` with
/// [`CommandResult::success`] set to `false`.
pub trait CommandExecutor {
    /// Run `program` with `args` and wait for it to exit.
    fn run(&self, program: &str, args: &[String], options: &CommandOptions)
        -> Result<CommandResult>;
}

/// Render a program and its arguments as a single display line.
pub fn command_line(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// [`CommandExecutor`] backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    /// Create a new system executor.
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemExecutor {
    fn run(
        &self,
        program: &str,
        args: &[String],
        options: &CommandOptions,
    ) -> Result<CommandResult> {
        let start = Instant::now();
        let line = command_line(program, args);

        let mut cmd = Command::new(program);
        cmd.args(args);
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(if options.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd.spawn().map_err(|e| {
            tracing::debug!("spawn of '{}' failed: {}", line, e);
            ProvisionError::CommandFailed {
                command: line.clone(),
                code: None,
            }
        })?;

        // stdin is fed from its own thread; tee echoes what it reads
        let writer = match (options.stdin.clone(), child.stdin.take()) {
            (Some(input), Some(mut pipe)) => Some(thread::spawn(move || pipe.write_all(&input))),
            _ => None,
        };

        let output = child.wait_with_output();

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!("writing stdin of '{}' failed: {}", line, e),
                Err(_) => tracing::debug!("stdin writer of '{}' panicked", line),
            }
        }

        let output = output.map_err(|e| {
            tracing::debug!("waiting for '{}' failed: {}", line, e);
            ProvisionError::CommandFailed {
                command: line.clone(),
                code: None,
            }
        })?;

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            Ok(CommandResult::success(stdout, stderr, duration))
        } else {
            Ok(CommandResult::failure(
                output.status.code(),
                stdout,
                stderr,
                duration,
            ))
        }
    }
}
