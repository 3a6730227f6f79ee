//! Run command implementation.
//!
//! The `deskprov run` command provisions the desktop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::cli::args::RunArgs;
use crate::config::LoadedConfig;
use crate::error::{ProvisionError, Result};
use crate::host::{FileSystem, HostContext, HostFileSystem};
use crate::report::RunReport;
use crate::runner::{ProvisioningRunner, RunOptions, RunProgress, RunStatus};
use crate::shell::{CommandExecutor, SystemExecutor};
use crate::steps::{build_plan, ExecutionResult, HttpKeyFetcher, KeyFetcher, StepStatus};
use crate::ui::{format_duration, OutputMode, SpinnerHandle, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::prepare::load_checked_config;

/// The run command implementation.
pub struct RunCommand {
    cwd: PathBuf,
    config_path: Option<PathBuf>,
    args: RunArgs,
    started_at: DateTime<Local>,
    log_file: Option<PathBuf>,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(cwd: &Path, config_path: Option<&Path>, args: RunArgs) -> Self {
        Self {
            cwd: cwd.to_path_buf(),
            config_path: config_path.map(Path::to_path_buf),
            args,
            started_at: Local::now(),
            log_file: None,
        }
    }

    /// Use the given start time for the run report.
    pub fn started_at(mut self, started_at: DateTime<Local>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Mention the run log in the final message.
    pub fn with_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.log_file = log_file;
        self
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    fn run_options(&self, use_sudo: bool) -> RunOptions {
        RunOptions {
            dry_run: self.args.dry_run,
            skip_phases: self.args.skip_phase.clone(),
            require_elevated: !use_sudo && !self.args.allow_unprivileged && !self.args.dry_run,
        }
    }

    /// Provision `host` with explicit collaborators.
    pub fn provision(
        &self,
        ui: &mut dyn UserInterface,
        loaded: &LoadedConfig,
        host: &HostContext,
        executor: &dyn CommandExecutor,
        fs: &dyn FileSystem,
        keys: &dyn KeyFetcher,
    ) -> Result<CommandResult> {
        let config = &loaded.config;
        let use_sudo = config.settings.use_sudo && !self.args.no_sudo;
        let options = self.run_options(use_sudo);
        let runner = ProvisioningRunner::new(executor, fs, keys).with_sudo(use_sudo);

        runner.check_host(host, &options)?;
        let plan = build_plan(config, host)?;
        let user = host.user()?;

        ui.show_header(&format!(
            "Provisioning {} desktop for {}",
            config.window_manager.name, user
        ));
        if ui.output_mode() == OutputMode::Verbose || self.args.dry_run {
            match &loaded.source {
                Some(path) => ui.message(&format!("Config: {}", path.display())),
                None => ui.message("Config: built-in defaults"),
            }
        }
        if self.args.dry_run {
            ui.message("Dry run: no changes will be made");
        }

        let dry_run = self.args.dry_run;
        let mut spinner: Option<Box<dyn SpinnerHandle>> = None;
        let outcome =
            runner.run_with_progress(&plan, host, &options, |progress| match progress {
                RunProgress::PhaseStarting { phase } => ui.show_phase(phase.title()),
                RunProgress::StepStarting { name, .. } => {
                    spinner = Some(ui.start_spinner(name));
                }
                RunProgress::StepFinished { result, policy } => {
                    if let Some(mut s) = spinner.take() {
                        finish_spinner(s.as_mut(), result, dry_run);
                    }
                    show_output(&mut *ui, result);
                    if !result.succeeded && !policy.stops_run() {
                        ui.warning(&format!("Continuing after failed step '{}'", result.step));
                    }
                }
            })?;

        if let Some(path) = &self.args.report {
            RunReport::new(self.started_at, user, self.args.dry_run, &outcome).write(path)?;
            ui.message(&format!("Report: {}", path.display()));
        }

        match &outcome.status {
            RunStatus::Completed => {
                let failed: Vec<_> = outcome.failures().collect();
                if failed.is_empty() {
                    ui.success(&format!(
                        "Provisioning complete in {} ({} done, {} already done)",
                        format_duration(outcome.duration),
                        outcome.count(StepStatus::Completed),
                        outcome.count(StepStatus::AlreadyDone)
                    ));
                } else {
                    ui.warning(&format!(
                        "Provisioning finished with {} failed step(s):",
                        failed.len()
                    ));
                    for result in failed {
                        ui.message(&format!("  {}", result.summary_line()));
                    }
                }
            }
            RunStatus::AbortedAt { step, .. } => {
                let message = outcome
                    .failures()
                    .last()
                    .and_then(|r| r.error.clone())
                    .unwrap_or_else(|| "unknown error".to_string());
                let err = ProvisionError::StepExecutionError {
                    step: step.clone(),
                    message,
                };
                ui.error(&err.to_string());
                ui.message(
                    "Fix the problem and run deskprov again; finished steps are skipped or repeated safely.",
                );
            }
        }
        if let Some(log) = &self.log_file {
            ui.message(&format!("Log: {}", log.display()));
        }

        let code = outcome.exit_code();
        Ok(if code == 0 {
            CommandResult::success()
        } else {
            CommandResult::failure(code)
        })
    }
}

fn finish_spinner(spinner: &mut dyn SpinnerHandle, result: &ExecutionResult, dry_run: bool) {
    match result.status() {
        StepStatus::Completed if dry_run => {
            spinner.finish_success(&format!(
                "{}  {}",
                result.step,
                result.stdout.trim_start_matches("Would run: ")
            ));
        }
        StepStatus::Completed => spinner.finish_success(&format!(
            "{} ({})",
            result.step,
            format_duration(result.duration)
        )),
        StepStatus::AlreadyDone => {
            spinner.finish_skipped(&format!("{} (already done)", result.step))
        }
        StepStatus::Failed => spinner.finish_error(&format!(
            "{} - {}",
            result.step,
            result.error.as_deref().unwrap_or("unknown error")
        )),
    }
}

fn show_output(ui: &mut dyn UserInterface, result: &ExecutionResult) {
    if ui.output_mode() != OutputMode::Verbose {
        return;
    }
    for output in [&result.stdout, &result.stderr] {
        if !output.trim().is_empty() {
            ui.show_command_output(output.trim_end());
        }
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let loaded = load_checked_config(&self.cwd, self.config_path.as_deref())?;
        let executor = SystemExecutor;
        let host = HostContext::resolve(&executor);
        let fs = HostFileSystem::new();
        let keys = HttpKeyFetcher::new(Duration::from_secs(
            loaded.config.settings.key_fetch_timeout_secs,
        ))?;

        self.provision(ui, &loaded, &host, &executor, &fs, &keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvisionConfig;
    use crate::shell::MockExecutor;
    use crate::steps::{Phase, StaticKeyFetcher};
    use crate::ui::{MockUI, SpinnerStatus};
    use std::fs;
    use tempfile::TempDir;

    fn defaults() -> LoadedConfig {
        LoadedConfig {
            config: ProvisionConfig::default(),
            source: None,
        }
    }

    fn alice() -> HostContext {
        HostContext::new("alice", "/home/alice")
    }

    #[test]
    fn dry_run_lists_every_step_without_side_effects() {
        let temp = TempDir::new().unwrap();
        let exec = MockExecutor::new();
        let host_fs = HostFileSystem::rooted(temp.path());
        let keys = StaticKeyFetcher::unreachable();
        let args = RunArgs {
            dry_run: true,
            ..Default::default()
        };
        let cmd = RunCommand::new(temp.path(), None, args);
        let mut ui = MockUI::new();

        let result = cmd
            .provision(&mut ui, &defaults(), &alice(), &exec, &host_fs, &keys)
            .unwrap();

        assert!(result.success);
        assert!(exec.calls().is_empty());
        assert_eq!(ui.finished().len(), 19);
        assert!(ui.has_message("Dry run"));
        assert_eq!(ui.phases().len(), 5);
    }

    #[test]
    fn abort_reports_failed_step_and_exit_code() {
        let temp = TempDir::new().unwrap();
        let exec = MockExecutor::new().fail(
            "sudo env DEBIAN_FRONTEND=noninteractive apt-get install -y openbox",
            100,
        );
        let host_fs = HostFileSystem::rooted(temp.path());
        let keys = StaticKeyFetcher::unreachable();
        let args = RunArgs {
            skip_phase: vec![Phase::Upgrade],
            ..Default::default()
        };
        let cmd = RunCommand::new(temp.path(), None, args);
        let mut ui = MockUI::new();

        let result = cmd
            .provision(&mut ui, &defaults(), &alice(), &exec, &host_fs, &keys)
            .unwrap();

        assert_eq!(result.exit_code, 1);
        assert!(ui.has_error("install openbox"));
        assert_eq!(
            ui.finished().last(),
            Some(&(
                "install openbox - Command failed with exit code Some(100): apt-get install -y openbox"
                    .to_string(),
                SpinnerStatus::Error
            ))
        );
    }

    #[test]
    fn no_sudo_without_root_is_a_precondition_error() {
        let temp = TempDir::new().unwrap();
        let exec = MockExecutor::new();
        let host_fs = HostFileSystem::rooted(temp.path());
        let keys = StaticKeyFetcher::unreachable();
        let args = RunArgs {
            no_sudo: true,
            ..Default::default()
        };
        let cmd = RunCommand::new(temp.path(), None, args);
        let mut ui = MockUI::new();

        let err = cmd
            .provision(&mut ui, &defaults(), &alice(), &exec, &host_fs, &keys)
            .unwrap_err();

        assert!(matches!(err, ProvisionError::NotElevated));
        assert_eq!(err.exit_code(), 2);
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn report_is_written_on_request() {
        let temp = TempDir::new().unwrap();
        let report = temp.path().join("report.json");
        let exec = MockExecutor::new();
        let host_fs = HostFileSystem::rooted(temp.path());
        let keys = StaticKeyFetcher::unreachable();
        let args = RunArgs {
            dry_run: true,
            skip_phase: vec![Phase::LocalConfig],
            report: Some(report.clone()),
            ..Default::default()
        };
        let cmd = RunCommand::new(temp.path(), None, args);
        let mut ui = MockUI::new();

        cmd.provision(&mut ui, &defaults(), &alice(), &exec, &host_fs, &keys)
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["steps"].as_array().unwrap().len(), 11);
    }
}
