//! User interface components.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for terminal usage, with spinners on a TTY
//! - [`MockUI`] for tests
//!
//! # Example
//!
//! ```
//! use deskprov::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.show_phase("Desktop packages");
//! ui.success("Provisioning complete");
//! assert_eq!(ui.phases(), ["Desktop packages"]);
//! ```

pub mod mock;
pub mod output;
pub mod progress;
pub mod spinner;
pub mod terminal;
pub mod theme;

pub use mock::{MockSpinner, MockUI, SpinnerStatus};
pub use output::OutputMode;
pub use progress::format_duration;
pub use spinner::{LineSpinner, ProgressSpinner};
pub use terminal::TerminalUI;
pub use theme::{should_use_colors, ProvisionTheme};

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message. Shown in every mode.
    fn error(&mut self, msg: &str);

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Show the title of a phase.
    fn show_phase(&mut self, title: &str);

    /// Show captured command output, indented under its step.
    fn show_command_output(&mut self, output: &str);

    /// Start a spinner for a step.
    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle>;

    /// Check if output goes to a terminal.
    fn is_interactive(&self) -> bool;
}

/// Handle for controlling a spinner.
pub trait SpinnerHandle {
    /// Update the spinner message.
    fn set_message(&mut self, msg: &str);

    /// Mark the operation as successful.
    fn finish_success(&mut self, msg: &str);

    /// Mark the operation as failed.
    fn finish_error(&mut self, msg: &str);

    /// Mark the operation as already done.
    fn finish_skipped(&mut self, msg: &str);
}
