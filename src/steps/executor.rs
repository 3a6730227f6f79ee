//! Step execution engine.
//!
//! Turns one [`ProvisioningStep`] into exactly one [`ExecutionResult`].
//! Step failures are reported in the result, never as `Err`; the runner
//! applies the step's failure policy.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::ProvisionError;
use crate::host::{DirOutcome, FileSystem, HostContext};
use crate::shell::{command_line, CommandExecutor, CommandOptions, CommandResult};
use crate::ui::format_duration;

use super::signing_key::{fetch_verified, KeyFetcher};
use super::step::{ProvisioningStep, StepAction};

/// `groupadd` exit status when the group already exists.
const GROUPADD_EXISTS: i32 = 9;

/// Status of a finished step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Step did its work.
    Completed,

    /// Step found its work already done.
    AlreadyDone,

    /// Step failed.
    Failed,
}

impl StepStatus {
    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            StepStatus::Completed => '✓',
            StepStatus::AlreadyDone => '○',
            StepStatus::Failed => '✗',
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Completed => "completed",
            StepStatus::AlreadyDone => "already done",
            StepStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of executing a single step.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Step name.
    pub step: String,

    /// Whether the step succeeded.
    pub succeeded: bool,

    /// Success came from a tolerated conflict ("already exists").
    pub tolerated: bool,

    /// Captured standard output of the last program run.
    pub stdout: String,

    /// Captured standard error of the last program run.
    pub stderr: String,

    /// Exit code of the last program run, if any.
    pub exit_code: Option<i32>,

    /// Execution duration.
    pub duration: Duration,

    /// Error message (if failed).
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Get the status of this result.
    pub fn status(&self) -> StepStatus {
        if !self.succeeded {
            StepStatus::Failed
        } else if self.tolerated {
            StepStatus::AlreadyDone
        } else {
            StepStatus::Completed
        }
    }

    /// Generate a summary line for display.
    pub fn summary_line(&self) -> String {
        let status = self.status();
        match status {
            StepStatus::Completed => format!(
                "{} {} ({})",
                status.display_char(),
                self.step,
                format_duration(self.duration)
            ),
            StepStatus::AlreadyDone => {
                format!("{} {} (already done)", status.display_char(), self.step)
            }
            StepStatus::Failed => {
                let error = self.error.as_deref().unwrap_or("unknown error");
                format!("{} {} - {}", status.display_char(), self.step, error)
            }
        }
    }
}

/// Options for step execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Describe the step instead of performing it.
    pub dry_run: bool,
}

/// Collaborators a step acts through.
pub struct StepEnv<'a> {
    pub executor: &'a dyn CommandExecutor,
    pub fs: &'a dyn FileSystem,
    pub keys: &'a dyn KeyFetcher,
    pub host: &'a HostContext,
    sudo: bool,
}

impl<'a> StepEnv<'a> {
    /// Create an environment that never prefixes commands with `sudo`.
    pub fn new(
        executor: &'a dyn CommandExecutor,
        fs: &'a dyn FileSystem,
        keys: &'a dyn KeyFetcher,
        host: &'a HostContext,
    ) -> Self {
        Self {
            executor,
            fs,
            keys,
            host,
            sudo: false,
        }
    }

    /// Prefix privileged commands with `sudo`. Has no effect when the host
    /// context is already elevated.
    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo && !self.host.elevated;
        self
    }

    /// Whether privileged commands are prefixed with `sudo`.
    pub fn uses_sudo(&self) -> bool {
        self.sudo
    }

    fn run(
        &self,
        privileged: bool,
        program: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
        stdin: Option<&[u8]>,
    ) -> crate::error::Result<CommandResult> {
        let options = CommandOptions {
            env: env.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            stdin: stdin.map(|s| s.to_vec()),
        };

        if privileged && self.sudo {
            // sudo resets the environment, so variables travel through env(1)
            let mut sudo_args: Vec<String> = Vec::with_capacity(args.len() + env.len() + 2);
            if !env.is_empty() {
                sudo_args.push("env".to_string());
                sudo_args.extend(env.iter().map(|(k, v)| format!("{}={}", k, v)));
            }
            sudo_args.push(program.to_string());
            sudo_args.extend(args.iter().cloned());
            self.executor.run("sudo", &sudo_args, &options)
        } else {
            self.executor.run(program, args, &options)
        }
    }

    fn query(&self, program: &str, args: &[&str]) -> Option<CommandResult> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.executor
            .run(program, &args, &CommandOptions::default())
            .ok()
    }

    /// Hand a path inside the user's home over to the user when running
    /// as root.
    fn give_to_user(&self, path: &Path) -> io::Result<()> {
        if self.host.elevated && self.host.owns_path(path) {
            self.fs.set_owner(path, self.host.uid, self.host.gid)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ActionOutput {
    stdout: String,
    stderr: String,
    exit_code: Option<i32>,
    tolerated: bool,
}

impl ActionOutput {
    fn tolerated() -> Self {
        Self {
            tolerated: true,
            ..Default::default()
        }
    }

    fn from_command(result: CommandResult) -> Self {
        Self {
            stdout: result.stdout,
            stderr: result.stderr,
            exit_code: result.exit_code,
            tolerated: false,
        }
    }
}

#[derive(Debug)]
struct ActionFailure {
    message: String,
    output: ActionOutput,
}

impl ActionFailure {
    fn command(line: &str, result: CommandResult) -> Self {
        Self {
            message: format!("Command failed with exit code {:?}: {}", result.exit_code, line),
            output: ActionOutput::from_command(result),
        }
    }
}

impl From<io::Error> for ActionFailure {
    fn from(err: io::Error) -> Self {
        Self {
            message: err.to_string(),
            output: ActionOutput::default(),
        }
    }
}

impl From<ProvisionError> for ActionFailure {
    fn from(err: ProvisionError) -> Self {
        Self {
            message: err.to_string(),
            output: ActionOutput::default(),
        }
    }
}

type ActionResult = std::result::Result<ActionOutput, ActionFailure>;

/// Execute a single step.
pub fn execute_step(
    step: &ProvisioningStep,
    env: &StepEnv<'_>,
    options: &ExecutionOptions,
) -> ExecutionResult {
    let start = Instant::now();

    if options.dry_run {
        return ExecutionResult {
            step: step.name.clone(),
            succeeded: true,
            tolerated: false,
            stdout: format!("Would run: {}", step.action.describe()),
            stderr: String::new(),
            exit_code: None,
            duration: Duration::ZERO,
            error: None,
        };
    }

    let outcome = perform(&step.action, env);
    let duration = start.elapsed();

    match outcome {
        Ok(output) => ExecutionResult {
            step: step.name.clone(),
            succeeded: true,
            tolerated: output.tolerated,
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
            duration,
            error: None,
        },
        Err(failure) => ExecutionResult {
            step: step.name.clone(),
            succeeded: false,
            tolerated: false,
            stdout: failure.output.stdout,
            stderr: failure.output.stderr,
            exit_code: failure.output.exit_code,
            duration,
            error: Some(failure.message),
        },
    }
}

fn perform(action: &StepAction, env: &StepEnv<'_>) -> ActionResult {
    match action {
        StepAction::Command {
            program,
            args,
            env: vars,
            privileged,
        } => {
            let result = env.run(*privileged, program, args, vars, None)?;
            if result.success {
                Ok(ActionOutput::from_command(result))
            } else {
                Err(ActionFailure::command(&command_line(program, args), result))
            }
        }
        StepAction::EnsureGroup { group } => ensure_group(env, group),
        StepAction::AddUserToGroup { user, group } => add_user_to_group(env, user, group),
        StepAction::EnsureDir { path } => ensure_dir(env, path),
        StepAction::CopyFile { from, to } => {
            env.fs.copy(from, to)?;
            env.give_to_user(to)?;
            Ok(ActionOutput::default())
        }
        StepAction::WriteFile {
            path,
            contents,
            executable,
        } => {
            env.fs.write(path, contents.as_bytes())?;
            if *executable {
                env.fs.set_executable(path)?;
            }
            env.give_to_user(path)?;
            Ok(ActionOutput::default())
        }
        StepAction::ImportSigningKey {
            url,
            keyring,
            sha256,
        } => {
            let key = fetch_verified(env.keys, url, sha256.as_deref())?;
            write_system_file(env, keyring, key.as_bytes())
        }
        StepAction::RegisterRepository { list_file, line } => {
            let contents = format!("{}\n", line.trim_end());
            write_system_file(env, list_file, contents.as_bytes())
        }
    }
}

fn ensure_group(env: &StepEnv<'_>, group: &str) -> ActionResult {
    if let Some(existing) = env.query("getent", &["group", group]) {
        if existing.success && !existing.stdout.trim().is_empty() {
            tracing::debug!("group '{}' already exists", group);
            return Ok(ActionOutput::tolerated());
        }
    }

    let args = vec![group.to_string()];
    let result = env.run(true, "groupadd", &args, &BTreeMap::new(), None)?;
    if result.success {
        Ok(ActionOutput::from_command(result))
    } else if result.exit_code == Some(GROUPADD_EXISTS) {
        tracing::info!("group '{}' already exists, continuing", group);
        let mut output = ActionOutput::from_command(result);
        output.tolerated = true;
        Ok(output)
    } else {
        Err(ActionFailure::command(&command_line("groupadd", &args), result))
    }
}

fn add_user_to_group(env: &StepEnv<'_>, user: &str, group: &str) -> ActionResult {
    if let Some(groups) = env.query("id", &["-nG", user]) {
        if groups.success && groups.stdout.split_whitespace().any(|g| g == group) {
            tracing::debug!("user '{}' is already in group '{}'", user, group);
            return Ok(ActionOutput::tolerated());
        }
    }

    let args = vec![
        "-a".to_string(),
        "-G".to_string(),
        group.to_string(),
        user.to_string(),
    ];
    let result = env.run(true, "usermod", &args, &BTreeMap::new(), None)?;
    if result.success {
        Ok(ActionOutput::from_command(result))
    } else {
        Err(ActionFailure::command(&command_line("usermod", &args), result))
    }
}

fn ensure_dir(env: &StepEnv<'_>, path: &Path) -> ActionResult {
    let outcome = env.fs.create_dir_all(path)?;
    if outcome == DirOutcome::AlreadyExisted {
        return Ok(ActionOutput::tolerated());
    }

    // Parents created on the way belong to the user too, up to (not
    // including) the home directory itself.
    if let Ok(home) = env.host.home() {
        for dir in path.ancestors().take_while(|d| *d != home) {
            env.give_to_user(dir)?;
        }
    }
    Ok(ActionOutput::default())
}

fn write_system_file(env: &StepEnv<'_>, path: &Path, contents: &[u8]) -> ActionResult {
    if !env.uses_sudo() {
        if let Some(parent) = path.parent() {
            env.fs.create_dir_all(parent)?;
        }
        env.fs.write(path, contents)?;
        return Ok(ActionOutput::default());
    }

    let none = BTreeMap::new();
    if let Some(parent) = path.parent() {
        let args = vec!["-p".to_string(), parent.display().to_string()];
        let result = env.run(true, "mkdir", &args, &none, None)?;
        if !result.success {
            return Err(ActionFailure::command(&command_line("mkdir", &args), result));
        }
    }

    let args = vec![path.display().to_string()];
    let result = env.run(true, "tee", &args, &none, Some(contents))?;
    if result.success {
        // tee echoes its input; the key body is not useful in the log
        Ok(ActionOutput {
            exit_code: result.exit_code,
            ..Default::default()
        })
    } else {
        Err(ActionFailure::command(&command_line("tee", &args), result))
    }
}
