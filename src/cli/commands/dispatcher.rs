//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::cli::args::{Cli, Commands, RunArgs};
use crate::error::Result;
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    cwd: PathBuf,
    started_at: DateTime<Local>,
    log_file: Option<PathBuf>,
}

impl CommandDispatcher {
    /// Create a new dispatcher working from `cwd`.
    pub fn new(cwd: PathBuf, started_at: DateTime<Local>) -> Self {
        Self {
            cwd,
            started_at,
            log_file: None,
        }
    }

    /// Record where the run log is written.
    pub fn with_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.log_file = log_file;
        self
    }

    /// Get the working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Dispatch and execute a command.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = cli.config.as_deref();
        match &cli.command {
            Some(Commands::Run(args)) => self.run(config, args.clone()).execute(ui),
            Some(Commands::Plan(args)) => {
                let cmd = super::plan::PlanCommand::new(&self.cwd, config, args.clone())
                    .no_color(cli.no_color);
                cmd.execute(ui)
            }
            Some(Commands::Completions(args)) => {
                let cmd = super::completions::CompletionsCommand::new(args.clone());
                cmd.execute(ui)
            }
            None => self.run(config, RunArgs::default()).execute(ui),
        }
    }

    fn run(&self, config: Option<&Path>, args: RunArgs) -> super::run::RunCommand {
        super::run::RunCommand::new(&self.cwd, config, args)
            .started_at(self.started_at)
            .with_log_file(self.log_file.clone())
    }
}
