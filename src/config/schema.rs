//! Configuration schema definitions for deskprov.
//!
//! This module contains the struct definitions that map to the YAML
//! configuration file. Every section is `#[serde(default)]`, so an empty
//! file yields the built-in Openbox + Chrome Remote Desktop setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::steps::{FailurePolicy, Phase};

/// Root configuration structure for deskprov.yml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Global settings
    pub settings: Settings,

    /// Failure policy per phase
    pub policies: PhasePolicies,

    /// Desktop packages installed one by one
    pub packages: Vec<String>,

    /// Window manager setup
    pub window_manager: WindowManagerConfig,

    /// Vendor repository and remote-desktop package
    pub remote_access: RemoteAccessConfig,

    /// Per-user background service
    pub service: ServiceConfig,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            policies: PhasePolicies::default(),
            packages: default_packages(),
            window_manager: WindowManagerConfig::default(),
            remote_access: RemoteAccessConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

fn default_packages() -> Vec<String> {
    ["openbox", "obconf", "lxterminal", "thunar", "obmenu"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Global settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Prefix privileged commands with sudo when not running as root
    pub use_sudo: bool,

    /// Run the system upgrade phase
    pub upgrade: bool,

    /// Pass DEBIAN_FRONTEND=noninteractive to apt
    pub noninteractive: bool,

    /// Timeout for fetching the signing key, in seconds
    pub key_fetch_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_sudo: true,
            upgrade: true,
            noninteractive: true,
            key_fetch_timeout_secs: 30,
        }
    }
}

/// Failure policy for each phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhasePolicies {
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub index_refresh: FailurePolicy,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub upgrade: FailurePolicy,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub desktop_packages: FailurePolicy,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub remote_access: FailurePolicy,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub local_config: FailurePolicy,
}

impl PhasePolicies {
    /// Policy applied to every step of `phase`.
    pub fn for_phase(&self, phase: Phase) -> FailurePolicy {
        match phase {
            Phase::IndexRefresh => self.index_refresh,
            Phase::Upgrade => self.upgrade,
            Phase::DesktopPackages => self.desktop_packages,
            Phase::RemoteAccess => self.remote_access,
            Phase::LocalConfig => self.local_config,
        }
    }

    /// The same policy for every phase.
    pub fn uniform(policy: FailurePolicy) -> Self {
        Self {
            index_refresh: policy,
            upgrade: policy,
            desktop_packages: policy,
            remote_access: policy,
            local_config: policy,
        }
    }
}

/// Window manager setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowManagerConfig {
    /// Window manager name, used in step labels
    pub name: String,

    /// System directory holding template config files
    pub template_dir: PathBuf,

    /// Files copied from the template directory
    pub config_files: Vec<String>,

    /// Config directory, relative to the user's home
    pub config_dir: PathBuf,

    /// Command the session launch file execs
    pub session_command: String,

    /// Session launch file, relative to the user's home
    pub session_file: PathBuf,
}

impl Default for WindowManagerConfig {
    fn default() -> Self {
        Self {
            name: "openbox".to_string(),
            template_dir: PathBuf::from("/etc/xdg/openbox"),
            config_files: vec!["rc.xml".to_string(), "menu.xml".to_string()],
            config_dir: PathBuf::from(".config/openbox"),
            session_command: "openbox-session".to_string(),
            session_file: PathBuf::from(".chrome-remote-desktop-session"),
        }
    }
}

impl WindowManagerConfig {
    /// Content of the session launch file: exactly one line.
    pub fn session_script(&self) -> String {
        format!("exec {}\n", self.session_command.trim())
    }
}

/// Vendor repository and remote-desktop package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteAccessConfig {
    /// Package installed from the vendor repository
    pub package: String,

    /// URL of the ASCII-armored signing key
    pub key_url: String,

    /// Optional SHA-256 pin of the signing key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_sha256: Option<String>,

    /// Where the key is stored
    pub keyring: PathBuf,

    /// apt sources file for the repository
    pub list_file: PathBuf,

    /// Repository base URL
    pub repository: String,

    /// Distribution suite
    pub suite: String,

    /// Repository components
    pub components: Vec<String>,

    /// Architecture restriction
    pub architecture: String,

    /// System group the user joins
    pub group: String,
}

impl Default for RemoteAccessConfig {
    fn default() -> Self {
        Self {
            package: "chrome-remote-desktop".to_string(),
            key_url: "https://dl.google.com/linux/linux_signing_key.pub".to_string(),
            key_sha256: None,
            keyring: PathBuf::from("/etc/apt/keyrings/chrome-remote-desktop.asc"),
            list_file: PathBuf::from("/etc/apt/sources.list.d/chrome-remote-desktop.list"),
            repository: "http://dl.google.com/linux/chrome-remote-desktop/deb/".to_string(),
            suite: "stable".to_string(),
            components: vec!["main".to_string()],
            architecture: "amd64".to_string(),
            group: "chrome-remote-desktop".to_string(),
        }
    }
}

impl RemoteAccessConfig {
    /// The one-line apt source entry, bound to the imported keyring.
    pub fn repository_line(&self) -> String {
        let mut options = Vec::new();
        if !self.architecture.is_empty() {
            options.push(format!("arch={}", self.architecture));
        }
        options.push(format!("signed-by={}", self.keyring.display()));
        format!(
            "deb [{}] {} {} {}",
            options.join(" "),
            self.repository,
            self.suite,
            self.components.join(" ")
        )
    }
}

/// Per-user background service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Template unit prefix; the user name is appended
    pub unit_prefix: String,

    /// Enable the unit at boot
    pub enable: bool,

    /// Start the unit now
    pub start: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            unit_prefix: "chrome-remote-desktop@".to_string(),
            enable: true,
            start: true,
        }
    }
}

impl ServiceConfig {
    /// Unit name for `user`.
    pub fn unit_for(&self, user: &str) -> String {
        format!("{}{}", self.unit_prefix, user)
    }
}
