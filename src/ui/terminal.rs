//! Terminal UI.

use console::Term;
use std::io::Write;

use crate::shell::is_ci;

use super::{
    LineSpinner, OutputMode, ProgressSpinner, ProvisionTheme, SpinnerHandle, UserInterface,
};

/// Indentation of step lines under their phase title.
const STEP_INDENT: usize = 2;

/// Terminal UI implementation.
///
/// Draws animated spinners when stdout is a terminal and plain lines
/// otherwise, so piped output and log captures stay readable.
pub struct TerminalUI {
    term: Term,
    theme: ProvisionTheme,
    mode: OutputMode,
}

impl TerminalUI {
    /// Create a new terminal UI.
    pub fn new(mode: OutputMode, no_color: bool) -> Self {
        Self {
            term: Term::stdout(),
            theme: ProvisionTheme::detect(no_color),
            mode,
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        writeln!(self.term, "{}", msg).ok();
    }

    fn success(&mut self, msg: &str) {
        writeln!(self.term, "{}", self.theme.format_success(msg)).ok();
    }

    fn warning(&mut self, msg: &str) {
        writeln!(self.term, "{}", self.theme.format_warning(msg)).ok();
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.term, "{}", self.theme.format_error(msg)).ok();
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_progress() {
            writeln!(self.term, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn show_phase(&mut self, title: &str) {
        if self.mode.shows_progress() {
            writeln!(self.term, "{}", self.theme.format_phase(title)).ok();
        }
    }

    fn show_command_output(&mut self, output: &str) {
        if !self.mode.shows_command_output() {
            return;
        }
        let indent = " ".repeat(STEP_INDENT * 2);
        for line in output.lines() {
            writeln!(self.term, "{}{}", indent, self.theme.command.apply_to(line)).ok();
        }
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if !self.mode.shows_progress() {
            Box::new(LineSpinner::new(STEP_INDENT, self.theme.clone()).errors_only())
        } else if self.is_interactive() {
            Box::new(ProgressSpinner::new(
                message,
                STEP_INDENT,
                self.theme.clone(),
            ))
        } else {
            Box::new(LineSpinner::new(STEP_INDENT, self.theme.clone()))
        }
    }

    fn is_interactive(&self) -> bool {
        self.term.is_term() && !is_ci()
    }
}
