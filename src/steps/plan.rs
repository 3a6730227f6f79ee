//! Ordered, immutable provisioning plans.

use serde::Serialize;

use super::step::{Phase, ProvisioningStep};

/// An ordered sequence of steps, built once and never modified during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProvisioningPlan {
    steps: Vec<ProvisioningStep>,
}

impl ProvisioningPlan {
    /// Create a plan from steps in execution order.
    pub fn new(steps: Vec<ProvisioningStep>) -> Self {
        Self { steps }
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[ProvisioningStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Look up a step by name.
    pub fn get(&self, name: &str) -> Option<&ProvisioningStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// A new plan without the steps of the given phases.
    pub fn without_phases(&self, phases: &[Phase]) -> Self {
        Self {
            steps: self
                .steps
                .iter()
                .filter(|s| !phases.contains(&s.phase))
                .cloned()
                .collect(),
        }
    }

    /// Steps grouped by phase, phases in execution order, empty phases omitted.
    pub fn by_phase(&self) -> Vec<(Phase, Vec<&ProvisioningStep>)> {
        Phase::ALL
            .into_iter()
            .map(|phase| {
                let steps: Vec<_> = self.steps.iter().filter(|s| s.phase == phase).collect();
                (phase, steps)
            })
            .filter(|(_, steps)| !steps.is_empty())
            .collect()
    }
}

impl<'a> IntoIterator for &'a ProvisioningPlan {
    type Item = &'a ProvisioningStep;
    type IntoIter = std::slice::Iter<'a, ProvisioningStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
