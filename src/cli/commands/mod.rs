//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results. Commands are
//! routed by [`CommandDispatcher`].

pub mod completions;
pub mod dispatcher;
pub mod plan;
pub mod prepare;
pub mod run;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
