//! Plan command implementation.
//!
//! The `deskprov plan` command shows what a run would do, grouped by phase.

use std::path::{Path, PathBuf};

use crate::cli::args::PlanArgs;
use crate::config::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use crate::host::HostContext;
use crate::shell::SystemExecutor;
use crate::steps::{build_plan, FailurePolicy, ProvisioningPlan};
use crate::ui::{ProvisionTheme, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::prepare::load_checked_config;

/// The plan command implementation.
pub struct PlanCommand {
    cwd: PathBuf,
    config_path: Option<PathBuf>,
    args: PlanArgs,
    no_color: bool,
}

impl PlanCommand {
    /// Create a new plan command.
    pub fn new(cwd: &Path, config_path: Option<&Path>, args: PlanArgs) -> Self {
        Self {
            cwd: cwd.to_path_buf(),
            config_path: config_path.map(Path::to_path_buf),
            args,
            no_color: false,
        }
    }

    /// Disable styling of the text listing.
    pub fn no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    /// Show the plan for `host`.
    pub fn show(
        &self,
        ui: &mut dyn UserInterface,
        config: &ProvisionConfig,
        host: &HostContext,
    ) -> Result<CommandResult> {
        let plan = build_plan(config, host)?.without_phases(&self.args.skip_phase);

        if self.args.json {
            let json = serde_json::to_string_pretty(&plan)
                .map_err(|e| ProvisionError::Other(e.into()))?;
            ui.message(&json);
        } else {
            let theme = ProvisionTheme::detect(self.no_color);
            for line in render_plan(&plan, &theme) {
                ui.message(&line);
            }
        }

        Ok(CommandResult::success())
    }
}

/// Text listing of a plan, one phase title followed by its steps.
pub fn render_plan(plan: &ProvisioningPlan, theme: &ProvisionTheme) -> Vec<String> {
    let mut lines = Vec::new();
    for (phase, steps) in plan.by_phase() {
        let policy = steps
            .first()
            .map(|s| s.on_failure)
            .unwrap_or_default();
        let suffix = if policy == FailurePolicy::Abort {
            String::new()
        } else {
            format!(" {}", theme.dim.apply_to(format!("[on failure: {}]", policy)))
        };
        lines.push(format!("{}{}", theme.format_phase(phase.title()), suffix));
        for step in steps {
            lines.push(format!(
                "    {:<40} {}",
                step.name,
                theme.command.apply_to(step.action.describe())
            ));
        }
        lines.push(String::new());
    }
    lines
}

impl Command for PlanCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let loaded = load_checked_config(&self.cwd, self.config_path.as_deref())?;
        let host = HostContext::resolve(&SystemExecutor);
        host.validate()?;
        self.show(ui, &loaded.config, &host)
    }
}
