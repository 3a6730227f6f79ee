//! Provisioning steps and their execution.
//!
//! - [`ProvisioningStep`] - A named unit of work with a failure policy
//! - [`ProvisioningPlan`] - The ordered steps of one run
//! - [`build_plan`] - The built-in desktop sequence
//! - [`execute_step`] - Perform one step and capture its result
//!
//! # Example
//!
//! ```
//! use deskprov::config::ProvisionConfig;
//! use deskprov::host::HostContext;
//! use deskprov::steps::{build_plan, Phase};
//!
//! let host = HostContext::new("alice", "/home/alice");
//! let plan = build_plan(&ProvisionConfig::default(), &host).unwrap();
//!
//! assert_eq!(plan.steps()[0].name, "refresh package index");
//! assert!(plan.by_phase().iter().any(|(p, _)| *p == Phase::LocalConfig));
//! ```

pub mod catalog;
pub mod executor;
pub mod plan;
pub mod signing_key;
pub mod step;

pub use catalog::build_plan;
pub use executor::{execute_step, ExecutionOptions, ExecutionResult, StepEnv, StepStatus};
pub use plan::ProvisioningPlan;
pub use signing_key::{
    fetch_verified, sha256_hex, validate_armored_key, verify_sha256, HttpKeyFetcher, KeyFetcher,
    StaticKeyFetcher,
};
pub use step::{FailurePolicy, Phase, ProvisioningStep, StepAction};
