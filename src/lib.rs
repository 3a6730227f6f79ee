//! deskprov - Provision an Openbox desktop reachable through Chrome Remote Desktop.
//!
//! A run installs the window manager packages, registers the vendor package
//! repository, installs the remote-desktop daemon and sets up the target
//! user's session. Every step is idempotent, so an interrupted run can
//! simply be started again.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading, parsing, and validation
//! - [`error`] - Error types and result aliases
//! - [`host`] - Target user resolution and filesystem access
//! - [`report`] - JSON run reports
//! - [`runner`] - Plan execution and failure policies
//! - [`shell`] - Command execution
//! - [`steps`] - The provisioning steps and their executor
//! - [`ui`] - Spinners and terminal output
//!
//! # Example
//!
//! ```
//! use deskprov::config::ProvisionConfig;
//! use deskprov::host::HostContext;
//! use deskprov::steps::build_plan;
//!
//! let host = HostContext::new("alice", "/home/alice");
//! let plan = build_plan(&ProvisionConfig::default(), &host).unwrap();
//! assert_eq!(plan.steps()[0].name, "refresh package index");
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod report;
pub mod runner;
pub mod shell;
pub mod steps;
pub mod ui;

pub use error::{ProvisionError, Result};
