//! Plan execution.

pub mod outcome;
pub mod provisioning;

pub use outcome::{RunOutcome, RunStatus};
pub use provisioning::{ProvisioningRunner, RunOptions, RunProgress};
