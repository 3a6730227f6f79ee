//! Per-step spinners.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::theme::ProvisionTheme;
use super::SpinnerHandle;

fn spinner_style(prefix: &str) -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
        .template(&format!("{}{{spinner:.cyan}} {{msg}}", prefix))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn message_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// An animated spinner for a running step.
pub struct ProgressSpinner {
    bar: ProgressBar,
    indent: usize,
    theme: ProvisionTheme,
}

impl ProgressSpinner {
    /// Create a new spinner with a message.
    pub fn new(message: &str, indent: usize, theme: ProvisionTheme) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style(&" ".repeat(indent)));
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        Self { bar, indent, theme }
    }

    /// Create a spinner that draws nothing.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            indent: 0,
            theme: ProvisionTheme::plain(),
        }
    }

    fn finish(&mut self, line: String) {
        let prefix = " ".repeat(self.indent);
        self.bar.set_style(message_style());
        self.bar.finish_with_message(format!("{}{}", prefix, line));
    }
}

impl SpinnerHandle for ProgressSpinner {
    fn set_message(&mut self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    fn finish_success(&mut self, msg: &str) {
        let line = self.theme.format_success(msg);
        self.finish(line);
    }

    fn finish_error(&mut self, msg: &str) {
        let line = self.theme.format_error(msg);
        self.finish(line);
    }

    fn finish_skipped(&mut self, msg: &str) {
        let line = self.theme.format_skipped(msg);
        self.finish(line);
    }
}

/// Spinner replacement for non-terminal output: prints only the final line.
pub struct LineSpinner {
    indent: usize,
    theme: ProvisionTheme,
    errors_only: bool,
}

impl LineSpinner {
    pub fn new(indent: usize, theme: ProvisionTheme) -> Self {
        Self {
            indent,
            theme,
            errors_only: false,
        }
    }

    /// Print nothing unless the step fails.
    pub fn errors_only(mut self) -> Self {
        self.errors_only = true;
        self
    }

    fn print(&self, line: String) {
        println!("{}{}", " ".repeat(self.indent), line);
    }
}

impl SpinnerHandle for LineSpinner {
    fn set_message(&mut self, _msg: &str) {}

    fn finish_success(&mut self, msg: &str) {
        if !self.errors_only {
            self.print(self.theme.format_success(msg));
        }
    }

    fn finish_error(&mut self, msg: &str) {
        self.print(self.theme.format_error(msg));
    }

    fn finish_skipped(&mut self, msg: &str) {
        if !self.errors_only {
            self.print(self.theme.format_skipped(msg));
        }
    }
}
