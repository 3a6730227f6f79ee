//! External process execution.
//!
//! Programs are always spawned with an explicit argument vector; nothing
//! is passed through a shell, so arguments never need quoting.

pub mod command;
pub mod mock;
pub mod platform;

pub use command::{
    command_line, CommandExecutor, CommandOptions, CommandResult, SystemExecutor,
};
pub use mock::MockExecutor;
pub use platform::{is_ci, is_elevated};
