//! Provisioning step definitions.
//!
//! A [`ProvisioningStep`] pairs a structured [`StepAction`] with the
//! [`FailurePolicy`] that decides what the runner does when it fails.
//! Actions are data: nothing here is a shell string.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::shell::command_line;

/// What the runner does when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run and exit with status 1.
    #[default]
    Abort,
    /// Record the failure and continue with the next step.
    LogAndContinue,
    /// Stop the run and exit with the given status.
    LogAndExit(i32),
}

impl FailurePolicy {
    /// Whether a failure under this policy ends the run.
    pub fn stops_run(&self) -> bool {
        !matches!(self, FailurePolicy::LogAndContinue)
    }

    /// Process exit status for a run stopped by this policy.
    pub fn exit_code(&self) -> i32 {
        match self {
            FailurePolicy::LogAndExit(code) if *code != 0 => *code,
            _ => 1,
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Abort => write!(f, "abort"),
            FailurePolicy::LogAndContinue => write!(f, "continue"),
            FailurePolicy::LogAndExit(code) => write!(f, "exit {}", code),
        }
    }
}

/// Logical group a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    IndexRefresh,
    Upgrade,
    DesktopPackages,
    RemoteAccess,
    LocalConfig,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 5] = [
        Phase::IndexRefresh,
        Phase::Upgrade,
        Phase::DesktopPackages,
        Phase::RemoteAccess,
        Phase::LocalConfig,
    ];

    /// Stable identifier used on the command line and in config.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::IndexRefresh => "index_refresh",
            Phase::Upgrade => "upgrade",
            Phase::DesktopPackages => "desktop_packages",
            Phase::RemoteAccess => "remote_access",
            Phase::LocalConfig => "local_config",
        }
    }

    /// Human-readable title.
    pub fn title(&self) -> &'static str {
        match self {
            Phase::IndexRefresh => "Package index",
            Phase::Upgrade => "System upgrade",
            Phase::DesktopPackages => "Desktop packages",
            Phase::RemoteAccess => "Remote access",
            Phase::LocalConfig => "Local configuration",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = Phase::ALL.iter().map(|p| p.as_str()).collect();
                format!("unknown phase '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// A structured unit of host configuration work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepAction {
    /// Run an external program.
    Command {
        program: String,
        args: Vec<String>,
        #[serde(skip_serializing_if = "BTreeMap::is_empty")]
        env: BTreeMap<String, String>,
        /// Needs root; prefixed with `sudo` when not already elevated.
        privileged: bool,
    },
    /// Create a system group unless it already exists.
    EnsureGroup { group: String },
    /// Add a user to a supplementary group unless already a member.
    AddUserToGroup { user: String, group: String },
    /// Create a directory and its parents unless it already exists.
    EnsureDir { path: PathBuf },
    /// Copy a file, replacing the destination.
    CopyFile { from: PathBuf, to: PathBuf },
    /// Write a file, replacing any previous content.
    WriteFile {
        path: PathBuf,
        contents: String,
        executable: bool,
    },
    /// Fetch an armored OpenPGP public key and store it as an apt keyring.
    ImportSigningKey {
        url: String,
        keyring: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        sha256: Option<String>,
    },
    /// Write an apt sources file holding exactly one repository line.
    RegisterRepository { list_file: PathBuf, line: String },
}

impl StepAction {
    /// Privileged program invocation.
    pub fn command(program: &str, args: &[&str]) -> Self {
        StepAction::Command {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: BTreeMap::new(),
            privileged: true,
        }
    }

    /// One-line description of what the action does.
    pub fn describe(&self) -> String {
        match self {
            StepAction::Command {
                program, args, env, ..
            } => {
                let vars: Vec<String> = env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                let line = command_line(program, args);
                if vars.is_empty() {
                    line
                } else {
                    format!("{} {}", vars.join(" "), line)
                }
            }
            StepAction::EnsureGroup { group } => format!("groupadd {} (if absent)", group),
            StepAction::AddUserToGroup { user, group } => {
                format!("usermod -a -G {} {} (if not a member)", group, user)
            }
            StepAction::EnsureDir { path } => format!("mkdir -p {}", path.display()),
            StepAction::CopyFile { from, to } => {
                format!("copy {} -> {}", from.display(), to.display())
            }
            StepAction::WriteFile {
                path, executable, ..
            } => {
                if *executable {
                    format!("write {} (executable)", path.display())
                } else {
                    format!("write {}", path.display())
                }
            }
            StepAction::ImportSigningKey { url, keyring, .. } => {
                format!("fetch {} -> {}", url, keyring.display())
            }
            StepAction::RegisterRepository { list_file, line } => {
                format!("write {}: {}", list_file.display(), line)
            }
        }
    }
}

/// One named unit of provisioning work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningStep {
    /// Human-readable label.
    pub name: String,

    /// Phase the step belongs to.
    pub phase: Phase,

    /// The work to perform.
    pub action: StepAction,

    /// What to do when the step fails.
    pub on_failure: FailurePolicy,

    /// Whether later steps depend on this one's success.
    pub critical: bool,
}

impl ProvisioningStep {
    /// Create a critical step that aborts the run on failure.
    pub fn new(name: impl Into<String>, phase: Phase, action: StepAction) -> Self {
        Self {
            name: name.into(),
            phase,
            action,
            on_failure: FailurePolicy::Abort,
            critical: true,
        }
    }

    /// Set the failure policy. Continuing past a failure makes the step
    /// non-critical.
    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self.critical = policy.stops_run();
        self
    }
}
