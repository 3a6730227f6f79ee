//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::steps::Phase;

/// deskprov - Provision an Openbox desktop with Chrome Remote Desktop.
#[derive(Debug, Parser)]
#[command(name = "deskprov")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides ./deskprov.yml and /etc/deskprov/config.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Show command output and debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Write the run log here instead of ./provision_<timestamp>.log
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Whether this invocation provisions the host (and so writes a run log).
    pub fn is_run(&self) -> bool {
        matches!(self.command, None | Some(Commands::Run(_)))
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Provision the desktop (default if no command specified)
    Run(RunArgs),

    /// Show the steps a run would perform
    Plan(PlanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Describe each step without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Leave out whole phases (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "PHASE")]
    pub skip_phase: Vec<Phase>,

    /// Write a JSON run report
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Never prefix commands with sudo
    #[arg(long)]
    pub no_sudo: bool,

    /// Run without sudo even when not root
    #[arg(long)]
    pub allow_unprivileged: bool,
}

/// Arguments for the `plan` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct PlanArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Leave out whole phases (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "PHASE")]
    pub skip_phase: Vec<Phase>,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
