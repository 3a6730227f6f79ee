//! The built-in provisioning sequence.
//!
//! [`build_plan`] turns a [`ProvisionConfig`] and a resolved [`HostContext`]
//! into the ordered step list for an Openbox desktop reachable through
//! Chrome Remote Desktop.

use std::collections::BTreeMap;

use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::host::HostContext;

use super::plan::ProvisioningPlan;
use super::step::{Phase, ProvisioningStep, StepAction};

/// Build the plan for `host` from `config`.
///
/// # Errors
///
/// Returns `MissingIdentity` when the host has no user or home directory;
/// the local configuration steps cannot be named without them.
pub fn build_plan(config: &ProvisionConfig, host: &HostContext) -> Result<ProvisioningPlan> {
    let user = host.user()?;
    let home = host.home()?;
    let policy = |phase: Phase| config.policies.for_phase(phase);

    let apt_env: BTreeMap<String, String> = if config.settings.noninteractive {
        BTreeMap::from([("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())])
    } else {
        BTreeMap::new()
    };
    let apt = |args: &[&str]| StepAction::Command {
        program: "apt-get".to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        env: apt_env.clone(),
        privileged: true,
    };
    let step = |name: String, phase: Phase, action: StepAction| {
        ProvisioningStep::new(name, phase, action).on_failure(policy(phase))
    };

    let mut steps = Vec::new();

    steps.push(step(
        "refresh package index".to_string(),
        Phase::IndexRefresh,
        apt(&["update", "-y"]),
    ));

    if config.settings.upgrade {
        steps.push(step(
            "upgrade packages".to_string(),
            Phase::Upgrade,
            apt(&["upgrade", "-y"]),
        ));
    }

    for package in &config.packages {
        steps.push(step(
            format!("install {}", package),
            Phase::DesktopPackages,
            apt(&["install", "-y", package]),
        ));
    }

    let remote = &config.remote_access;
    steps.push(step(
        "import signing key".to_string(),
        Phase::RemoteAccess,
        StepAction::ImportSigningKey {
            url: remote.key_url.clone(),
            keyring: remote.keyring.clone(),
            sha256: remote.key_sha256.clone(),
        },
    ));
    steps.push(step(
        "register repository".to_string(),
        Phase::RemoteAccess,
        StepAction::RegisterRepository {
            list_file: remote.list_file.clone(),
            line: remote.repository_line(),
        },
    ));
    steps.push(step(
        "refresh package index".to_string(),
        Phase::RemoteAccess,
        apt(&["update", "-y"]),
    ));
    steps.push(step(
        format!("install {}", remote.package),
        Phase::RemoteAccess,
        apt(&["install", "-y", &remote.package]),
    ));

    let wm = &config.window_manager;
    let config_dir = home.join(&wm.config_dir);

    steps.push(step(
        format!("ensure group {}", remote.group),
        Phase::LocalConfig,
        StepAction::EnsureGroup {
            group: remote.group.clone(),
        },
    ));
    steps.push(step(
        format!("add {} to {}", user, remote.group),
        Phase::LocalConfig,
        StepAction::AddUserToGroup {
            user: user.to_string(),
            group: remote.group.clone(),
        },
    ));
    steps.push(step(
        format!("create {} config dir", wm.name),
        Phase::LocalConfig,
        StepAction::EnsureDir {
            path: config_dir.clone(),
        },
    ));
    for file in &wm.config_files {
        steps.push(step(
            format!("copy {}", file),
            Phase::LocalConfig,
            StepAction::CopyFile {
                from: wm.template_dir.join(file),
                to: config_dir.join(file),
            },
        ));
    }
    steps.push(step(
        "write session file".to_string(),
        Phase::LocalConfig,
        StepAction::WriteFile {
            path: home.join(&wm.session_file),
            contents: wm.session_script(),
            executable: true,
        },
    ));

    let unit = config.service.unit_for(user);
    if config.service.enable {
        steps.push(step(
            format!("enable {}", unit),
            Phase::LocalConfig,
            StepAction::command("systemctl", &["enable", &unit]),
        ));
    }
    if config.service.start {
        steps.push(step(
            format!("start {}", unit),
            Phase::LocalConfig,
            StepAction::command("systemctl", &["start", &unit]),
        ));
    }

    Ok(ProvisioningPlan::new(steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;
    use crate::steps::FailurePolicy;
    use std::path::PathBuf;

    fn alice() -> HostContext {
        HostContext::new("alice", "/home/alice")
    }

    fn names(plan: &ProvisioningPlan) -> Vec<&str> {
        plan.steps().iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn default_plan_reproduces_desktop_setup() {
        let plan = build_plan(&ProvisionConfig::default(), &alice()).unwrap();

        assert_eq!(
            names(&plan),
            vec![
                "refresh package index",
                "upgrade packages",
                "install openbox",
                "install obconf",
                "install lxterminal",
                "install thunar",
                "install obmenu",
                "import signing key",
                "register repository",
                "refresh package index",
                "install chrome-remote-desktop",
                "ensure group chrome-remote-desktop",
                "add alice to chrome-remote-desktop",
                "create openbox config dir",
                "copy rc.xml",
                "copy menu.xml",
                "write session file",
                "enable chrome-remote-desktop@alice",
                "start chrome-remote-desktop@alice",
            ]
        );
    }

    #[test]
    fn apt_commands_are_noninteractive() {
        let plan = build_plan(&ProvisionConfig::default(), &alice()).unwrap();
        let upgrade = plan.get("upgrade packages").unwrap();

        assert_eq!(
            upgrade.action.describe(),
            "DEBIAN_FRONTEND=noninteractive apt-get upgrade -y"
        );
    }

    #[test]
    fn interactive_apt_has_no_env() {
        let mut config = ProvisionConfig::default();
        config.settings.noninteractive = false;
        let plan = build_plan(&config, &alice()).unwrap();

        assert_eq!(
            plan.get("install openbox").unwrap().action.describe(),
            "apt-get install -y openbox"
        );
    }

    #[test]
    fn local_paths_live_under_home() {
        let plan = build_plan(&ProvisionConfig::default(), &alice()).unwrap();

        assert_eq!(
            plan.get("copy rc.xml").unwrap().action,
            StepAction::CopyFile {
                from: PathBuf::from("/etc/xdg/openbox/rc.xml"),
                to: PathBuf::from("/home/alice/.config/openbox/rc.xml"),
            }
        );
        assert_eq!(
            plan.get("write session file").unwrap().action,
            StepAction::WriteFile {
                path: PathBuf::from("/home/alice/.chrome-remote-desktop-session"),
                contents: "exec openbox-session\n".to_string(),
                executable: true,
            }
        );
    }

    #[test]
    fn phase_policies_are_applied() {
        let mut config = ProvisionConfig::default();
        config.policies.remote_access = FailurePolicy::LogAndContinue;
        let plan = build_plan(&config, &alice()).unwrap();

        let key = plan.get("import signing key").unwrap();
        assert_eq!(key.on_failure, FailurePolicy::LogAndContinue);
        assert!(!key.critical);

        let openbox = plan.get("install openbox").unwrap();
        assert_eq!(openbox.on_failure, FailurePolicy::Abort);
        assert!(openbox.critical);
    }

    #[test]
    fn toggles_drop_steps() {
        let mut config = ProvisionConfig::default();
        config.settings.upgrade = false;
        config.service.start = false;
        let plan = build_plan(&config, &alice()).unwrap();

        assert!(plan.get("upgrade packages").is_none());
        assert!(plan.get("start chrome-remote-desktop@alice").is_none());
        assert!(plan.get("enable chrome-remote-desktop@alice").is_some());
    }

    #[test]
    fn custom_packages_each_get_a_step() {
        let mut config = ProvisionConfig::default();
        config.packages = vec!["xterm".into()];
        let plan = build_plan(&config, &alice()).unwrap();

        let desktop: Vec<_> = plan
            .steps()
            .iter()
            .filter(|s| s.phase == Phase::DesktopPackages)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(desktop, vec!["install xterm"]);
    }

    #[test]
    fn unresolved_home_is_an_error() {
        let err = build_plan(&ProvisionConfig::default(), &alice().without_home()).unwrap_err();
        assert!(matches!(err, ProvisionError::MissingIdentity { .. }));
    }
}
