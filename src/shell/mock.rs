//! Recording executor for testing.
//!
//! `MockExecutor` implements [`CommandExecutor`] without spawning
//! anything. Every invocation is recorded as a display line, and canned
//! results are returned for invocations whose line starts with a
//! configured prefix. Unmatched invocations succeed with empty output.
//!
//! # Example
//!
//! ```
//! use deskprov::shell::{CommandExecutor, CommandOptions, MockExecutor};
//!
//! let exec = MockExecutor::new().fail("apt-get install -y openbox", 100);
//!
//! let ok = exec.run("apt-get", &["update".into()], &CommandOptions::default()).unwrap();
//! assert!(ok.success);
//!
//! let args: Vec<String> = vec!["install".into(), "-y".into(), "openbox".into()];
//! let failed = exec.run("apt-get", &args, &CommandOptions::default()).unwrap();
//! assert_eq!(failed.exit_code, Some(100));
//!
//! assert_eq!(exec.calls().len(), 2);
//! ```

use std::cell::RefCell;
use std::time::Duration;

use crate::error::Result;

use super::command::{command_line, CommandExecutor, CommandOptions, CommandResult};

/// Executor that records invocations and returns canned results.
#[derive(Debug, Default)]
pub struct MockExecutor {
    calls: RefCell<Vec<String>>,
    responses: Vec<(String, CommandResult)>,
}

impl MockExecutor {
    /// Create a mock where every invocation succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to invocations starting with `prefix` with the given exit
    /// code and standard output. Earlier registrations win.
    pub fn respond(mut self, prefix: &str, exit_code: i32, stdout: &str) -> Self {
        let result = if exit_code == 0 {
            CommandResult::success(stdout.to_string(), String::new(), Duration::ZERO)
        } else {
            CommandResult::failure(
                Some(exit_code),
                stdout.to_string(),
                format!("{}: exit {}", prefix, exit_code),
                Duration::ZERO,
            )
        };
        self.responses.push((prefix.to_string(), result));
        self
    }

    /// Make invocations starting with `prefix` fail with `exit_code`.
    pub fn fail(self, prefix: &str, exit_code: i32) -> Self {
        self.respond(prefix, exit_code, "")
    }

    /// All recorded invocations, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Whether any recorded invocation starts with `prefix`.
    pub fn was_called(&self, prefix: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.starts_with(prefix))
    }
}

impl CommandExecutor for MockExecutor {
    fn run(
        &self,
        program: &str,
        args: &[String],
        _options: &CommandOptions,
    ) -> Result<CommandResult> {
        let line = command_line(program, args);
        self.calls.borrow_mut().push(line.clone());

        let result = self
            .responses
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| CommandResult::success(String::new(), String::new(), Duration::ZERO));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_prefix_wins() {
        let exec = MockExecutor::new()
            .respond("id -nG alice", 0, "alice sudo")
            .fail("id", 1);

        let r = exec
            .run("id", &["-nG".into(), "alice".into()], &CommandOptions::default())
            .unwrap();
        assert!(r.success);
        assert_eq!(r.stdout, "alice sudo");

        let r = exec
            .run("id", &["-nG".into(), "bob".into()], &CommandOptions::default())
            .unwrap();
        assert!(!r.success);
    }

    #[test]
    fn records_calls_in_order() {
        let exec = MockExecutor::new();
        exec.run("a", &[], &CommandOptions::default()).unwrap();
        exec.run("b", &["x".into()], &CommandOptions::default())
            .unwrap();

        assert_eq!(exec.calls(), vec!["a".to_string(), "b x".to_string()]);
        assert!(exec.was_called("b"));
        assert!(!exec.was_called("c"));
    }
}
