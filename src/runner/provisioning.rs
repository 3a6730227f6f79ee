//! Sequential plan execution.

use std::time::Instant;

use tracing::{error, info, warn};

use crate::error::{ProvisionError, Result};
use crate::host::{FileSystem, HostContext};
use crate::shell::CommandExecutor;
use crate::steps::{
    execute_step, ExecutionOptions, ExecutionResult, FailurePolicy, KeyFetcher, Phase,
    ProvisioningPlan, StepEnv,
};

use super::outcome::{RunOutcome, RunStatus};

/// Progress events emitted during a run.
#[derive(Debug)]
pub enum RunProgress<'a> {
    /// The first step of a phase is about to start.
    PhaseStarting { phase: Phase },
    /// A step is about to start.
    StepStarting {
        name: &'a str,
        index: usize,
        total: usize,
    },
    /// A step finished.
    StepFinished {
        result: &'a ExecutionResult,
        policy: FailurePolicy,
    },
}

/// Options for a run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Describe steps instead of performing them.
    pub dry_run: bool,
    /// Phases left out of the run.
    pub skip_phases: Vec<Phase>,
    /// Refuse to start unless the process is root.
    pub require_elevated: bool,
}

/// Runs a [`ProvisioningPlan`] step by step against a host.
pub struct ProvisioningRunner<'a> {
    executor: &'a dyn CommandExecutor,
    fs: &'a dyn FileSystem,
    keys: &'a dyn KeyFetcher,
    use_sudo: bool,
}

impl<'a> ProvisioningRunner<'a> {
    /// Create a runner that never prefixes commands with `sudo`.
    pub fn new(
        executor: &'a dyn CommandExecutor,
        fs: &'a dyn FileSystem,
        keys: &'a dyn KeyFetcher,
    ) -> Self {
        Self {
            executor,
            fs,
            keys,
            use_sudo: false,
        }
    }

    /// Prefix privileged commands with `sudo` when not elevated.
    pub fn with_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    /// Check the preconditions of a run without running anything.
    pub fn check_host(&self, host: &HostContext, options: &RunOptions) -> Result<()> {
        if options.require_elevated && !host.elevated {
            return Err(ProvisionError::NotElevated);
        }
        host.validate()
    }

    /// Run the plan.
    pub fn run(
        &self,
        plan: &ProvisioningPlan,
        host: &HostContext,
        options: &RunOptions,
    ) -> Result<RunOutcome> {
        self.run_with_progress(plan, host, options, |_| {})
    }

    /// Run the plan with a progress callback.
    ///
    /// Only precondition failures are returned as `Err`, and then no step
    /// has run. Step failures are recorded in the outcome.
    pub fn run_with_progress(
        &self,
        plan: &ProvisioningPlan,
        host: &HostContext,
        options: &RunOptions,
        mut on_progress: impl FnMut(RunProgress<'_>),
    ) -> Result<RunOutcome> {
        self.check_host(host, options)?;

        let start = Instant::now();
        let plan = plan.without_phases(&options.skip_phases);
        let total = plan.len();
        let env = StepEnv::new(self.executor, self.fs, self.keys, host).with_sudo(self.use_sudo);
        let exec_options = ExecutionOptions {
            dry_run: options.dry_run,
        };

        info!(
            "starting run of {} steps for {} (dry_run={}, sudo={})",
            total,
            host.user()?,
            options.dry_run,
            env.uses_sudo()
        );

        let mut results = Vec::with_capacity(total);
        let mut status = RunStatus::Completed;
        let mut current_phase = None;

        for (index, step) in plan.steps().iter().enumerate() {
            if current_phase != Some(step.phase) {
                current_phase = Some(step.phase);
                on_progress(RunProgress::PhaseStarting { phase: step.phase });
            }

            on_progress(RunProgress::StepStarting {
                name: &step.name,
                index,
                total,
            });
            info!("step {}/{}: {}", index + 1, total, step.name);

            let result = execute_step(step, &env, &exec_options);

            if result.succeeded {
                if result.tolerated {
                    info!("'{}' already done", step.name);
                } else {
                    info!("'{}' completed in {:?}", step.name, result.duration);
                }
            } else {
                let message = result.error.as_deref().unwrap_or("unknown error");
                if step.on_failure.stops_run() {
                    error!("'{}' failed: {}", step.name, message);
                } else {
                    warn!("'{}' failed, continuing: {}", step.name, message);
                }
                if !result.stderr.trim().is_empty() {
                    info!("'{}' stderr: {}", step.name, result.stderr.trim());
                }
            }

            on_progress(RunProgress::StepFinished {
                result: &result,
                policy: step.on_failure,
            });

            let stop = !result.succeeded && step.on_failure.stops_run();
            results.push(result);

            if stop {
                status = RunStatus::AbortedAt {
                    step: step.name.clone(),
                    exit_code: step.on_failure.exit_code(),
                };
                break;
            }
        }

        let duration = start.elapsed();
        match &status {
            RunStatus::Completed => info!("run completed in {:?}", duration),
            RunStatus::AbortedAt { step, exit_code } => {
                error!("run aborted at '{}' with exit code {}", step, exit_code)
            }
        }

        Ok(RunOutcome {
            results,
            status,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PhasePolicies, ProvisionConfig};
    use crate::host::HostFileSystem;
    use crate::shell::MockExecutor;
    use crate::steps::{build_plan, ProvisioningStep, StaticKeyFetcher, StepAction, StepStatus};
    use std::fs;
    use tempfile::TempDir;

    const KEY: &str =
        "-----BEGIN PGP PUBLIC KEY BLOCK-----\n\nmQINBFcMjNMBEAC6\n-----END PGP PUBLIC KEY BLOCK-----\n";

    fn alice() -> HostContext {
        HostContext::new("alice", "/home/alice")
    }

    fn sandbox() -> TempDir {
        let temp = TempDir::new().unwrap();
        let templates = temp.path().join("etc/xdg/openbox");
        fs::create_dir_all(&templates).unwrap();
        fs::write(templates.join("rc.xml"), "<openbox_config/>").unwrap();
        fs::write(templates.join("menu.xml"), "<openbox_menu/>").unwrap();
        fs::create_dir_all(temp.path().join("home/alice")).unwrap();
        temp
    }

    fn command_step(name: &str, program: &str, policy: FailurePolicy) -> ProvisioningStep {
        ProvisioningStep::new(
            name,
            Phase::DesktopPackages,
            StepAction::command(program, &[name]),
        )
        .on_failure(policy)
    }

    #[test]
    fn openbox_failure_aborts_after_two_results() {
        let exec = MockExecutor::new().fail("apt-get install -y openbox", 100);
        let fs = HostFileSystem::new();
        let keys = StaticKeyFetcher::unreachable();
        let host = alice();
        let plan = build_plan(&ProvisionConfig::default(), &host).unwrap();
        let options = RunOptions {
            skip_phases: vec![Phase::Upgrade],
            ..Default::default()
        };

        let outcome = ProvisioningRunner::new(&exec, &fs, &keys)
            .run(&plan, &host, &options)
            .unwrap();

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(
            outcome.status,
            RunStatus::AbortedAt {
                step: "install openbox".into(),
                exit_code: 1
            }
        );
        assert_ne!(outcome.exit_code(), 0);
        assert!(!exec.was_called("apt-get install -y obconf"));
    }

    #[test]
    fn log_and_continue_records_failure_once_and_runs_later_steps() {
        let exec = MockExecutor::new().fail("second", 1);
        let fs = HostFileSystem::new();
        let keys = StaticKeyFetcher::unreachable();
        let host = alice();
        let plan = ProvisioningPlan::new(vec![
            command_step("first", "first", FailurePolicy::Abort),
            command_step("second", "second", FailurePolicy::LogAndContinue),
            command_step("third", "third", FailurePolicy::Abort),
        ]);

        let outcome = ProvisioningRunner::new(&exec, &fs, &keys)
            .run(&plan, &host, &RunOptions::default())
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.failures().count(), 1);
        assert!(exec.was_called("third"));
    }

    #[test]
    fn log_and_exit_uses_its_code() {
        let exec = MockExecutor::new().fail("first", 1);
        let fs = HostFileSystem::new();
        let keys = StaticKeyFetcher::unreachable();
        let host = alice();
        let plan = ProvisioningPlan::new(vec![
            command_step("first", "first", FailurePolicy::LogAndExit(5)),
            command_step("second", "second", FailurePolicy::Abort),
        ]);

        let outcome = ProvisioningRunner::new(&exec, &fs, &keys)
            .run(&plan, &host, &RunOptions::default())
            .unwrap();

        assert_eq!(outcome.exit_code(), 5);
        assert_eq!(outcome.results.len(), 1);
        assert!(!exec.was_called("second"));
    }

    #[test]
    fn unresolved_home_is_a_precondition_error() {
        let exec = MockExecutor::new();
        let fs = HostFileSystem::new();
        let keys = StaticKeyFetcher::unreachable();
        let host = alice();
        let plan = build_plan(&ProvisionConfig::default(), &host).unwrap();

        let err = ProvisioningRunner::new(&exec, &fs, &keys)
            .run(&plan, &host.without_home(), &RunOptions::default())
            .unwrap_err();

        assert!(err.is_precondition());
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn unprivileged_host_fails_when_elevation_required() {
        let exec = MockExecutor::new();
        let fs = HostFileSystem::new();
        let keys = StaticKeyFetcher::unreachable();
        let runner = ProvisioningRunner::new(&exec, &fs, &keys);
        let options = RunOptions {
            require_elevated: true,
            ..Default::default()
        };

        let err = runner
            .run(&ProvisioningPlan::default(), &alice(), &options)
            .unwrap_err();
        assert!(matches!(err, ProvisionError::NotElevated));

        assert!(runner
            .check_host(&alice().with_elevated(true), &options)
            .is_ok());
    }

    #[test]
    fn skipped_phases_produce_no_results() {
        let exec = MockExecutor::new();
        let fs = HostFileSystem::new();
        let keys = StaticKeyFetcher::unreachable();
        let host = alice();
        let plan = build_plan(&ProvisionConfig::default(), &host).unwrap();
        let options = RunOptions {
            dry_run: true,
            skip_phases: vec![Phase::RemoteAccess, Phase::LocalConfig],
            ..Default::default()
        };

        let outcome = ProvisioningRunner::new(&exec, &fs, &keys)
            .run(&plan, &host, &options)
            .unwrap();

        assert_eq!(outcome.results.len(), 7);
        assert!(outcome.results.iter().all(|r| r.succeeded));
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn progress_events_follow_phases() {
        let exec = MockExecutor::new();
        let fs = HostFileSystem::new();
        let keys = StaticKeyFetcher::unreachable();
        let host = alice();
        let mut config = ProvisionConfig::default();
        config.packages = vec!["openbox".into()];
        let plan = build_plan(&config, &host).unwrap();
        let options = RunOptions {
            dry_run: true,
            skip_phases: vec![Phase::RemoteAccess, Phase::LocalConfig],
            ..Default::default()
        };

        let mut events = Vec::new();
        ProvisioningRunner::new(&exec, &fs, &keys)
            .run_with_progress(&plan, &host, &options, |progress| match progress {
                RunProgress::PhaseStarting { phase } => events.push(format!("phase:{}", phase)),
                RunProgress::StepStarting { name, .. } => events.push(format!("start:{}", name)),
                RunProgress::StepFinished { result, .. } => {
                    events.push(format!("finish:{}", result.step))
                }
            })
            .unwrap();

        assert_eq!(
            events,
            vec![
                "phase:index_refresh",
                "start:refresh package index",
                "finish:refresh package index",
                "phase:upgrade",
                "start:upgrade packages",
                "finish:upgrade packages",
                "phase:desktop_packages",
                "start:install openbox",
                "finish:install openbox",
            ]
        );
    }

    #[test]
    fn rerun_of_succeeded_plan_has_no_failures() {
        let temp = sandbox();
        let exec = MockExecutor::new()
            .respond(
                "getent group chrome-remote-desktop",
                0,
                "chrome-remote-desktop:x:998:alice\n",
            )
            .respond("id -nG alice", 0, "alice chrome-remote-desktop\n");
        let fs = HostFileSystem::rooted(temp.path());
        let keys = StaticKeyFetcher::new(KEY);
        let host = alice();
        let plan = build_plan(&ProvisionConfig::default(), &host).unwrap();
        let runner = ProvisioningRunner::new(&exec, &fs, &keys);

        let first = runner.run(&plan, &host, &RunOptions::default()).unwrap();
        assert_eq!(
            first.status,
            RunStatus::Completed,
            "{:?}",
            first.failures().collect::<Vec<_>>()
        );

        let second = runner.run(&plan, &host, &RunOptions::default()).unwrap();
        assert_eq!(second.status, RunStatus::Completed);
        assert_eq!(second.failures().count(), 0);
        assert_eq!(second.count(StepStatus::AlreadyDone), 3);

        let list = fs::read_to_string(
            temp.path()
                .join("etc/apt/sources.list.d/chrome-remote-desktop.list"),
        )
        .unwrap();
        assert_eq!(list.lines().count(), 1);
    }

    #[test]
    fn uniform_continue_policy_never_aborts() {
        let temp = sandbox();
        let exec = MockExecutor::new().fail("apt-get", 100);
        let fs = HostFileSystem::rooted(temp.path());
        let keys = StaticKeyFetcher::unreachable();
        let host = alice();
        let mut config = ProvisionConfig::default();
        config.policies = PhasePolicies::uniform(FailurePolicy::LogAndContinue);
        let plan = build_plan(&config, &host).unwrap();

        let outcome = ProvisioningRunner::new(&exec, &fs, &keys)
            .run(&plan, &host, &RunOptions::default())
            .unwrap();

        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.results.len(), plan.len());
        // 9 apt steps plus the unreachable key
        assert_eq!(outcome.failures().count(), 10);
    }
}
