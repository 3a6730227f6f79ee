//! Error types for deskprov operations.
//!
//! This module defines [`ProvisionError`], the primary error type used
//! throughout the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Precondition variants ([`ProvisionError::NotElevated`],
//!   [`ProvisionError::MissingIdentity`]) are fatal before any step runs
//! - A failing step never escapes as an `Err`; it becomes a failed
//!   [`ExecutionResult`](crate::steps::ExecutionResult) and its failure
//!   policy decides what happens next
//! - Use `anyhow::Error` (via `ProvisionError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for deskprov operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The run needs root and the process is not elevated.
    #[error("Elevated privileges required: re-run as root or with sudo")]
    NotElevated,

    /// The invoking user or their home directory could not be resolved.
    #[error("Cannot resolve {what} for the invoking user")]
    MissingIdentity { what: String },

    /// Configuration file not found at an explicitly given location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// Step execution failed.
    #[error("Step '{step}' failed: {message}")]
    StepExecutionError { step: String, message: String },

    /// External command could not be spawned or exited non-zero.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// Vendor signing key could not be fetched or did not validate.
    #[error("Signing key import from {url} failed: {message}")]
    KeyImportFailed { url: String, message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProvisionError {
    /// Whether this error is a precondition failure detected before any step.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ProvisionError::NotElevated | ProvisionError::MissingIdentity { .. }
        )
    }

    /// Whether this error comes from loading or validating configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ProvisionError::ConfigNotFound { .. }
                | ProvisionError::ConfigParseError { .. }
                | ProvisionError::ConfigValidationError { .. }
        )
    }

    /// Process exit status for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        if self.is_precondition() || self.is_config() {
            2
        } else {
            1
        }
    }
}

/// Result type alias for deskprov operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_identity_displays_what() {
        let err = ProvisionError::MissingIdentity {
            what: "home directory".into(),
        };
        assert!(err.to_string().contains("home directory"));
    }

    #[test]
    fn config_parse_error_displays_path_and_message() {
        let err = ProvisionError::ConfigParseError {
            path: PathBuf::from("/etc/deskprov/config.yml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/etc/deskprov/config.yml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn step_execution_error_displays_step_and_message() {
        let err = ProvisionError::StepExecutionError {
            step: "install openbox".into(),
            message: "apt-get not found".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("install openbox"));
        assert!(msg.contains("apt-get not found"));
    }

    #[test]
    fn command_failed_displays_command_and_code() {
        let err = ProvisionError::CommandFailed {
            command: "apt-get update -y".into(),
            code: Some(100),
        };
        let msg = err.to_string();
        assert!(msg.contains("apt-get update -y"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn key_import_failed_displays_url() {
        let err = ProvisionError::KeyImportFailed {
            url: "https://example.com/key.pub".into(),
            message: "HTTP 404".into(),
        };
        assert!(err.to_string().contains("https://example.com/key.pub"));
    }

    #[test]
    fn precondition_classification() {
        assert!(ProvisionError::NotElevated.is_precondition());
        assert!(ProvisionError::MissingIdentity {
            what: "user".into()
        }
        .is_precondition());
        assert!(!ProvisionError::ConfigValidationError {
            message: "x".into()
        }
        .is_precondition());
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: ProvisionError = io_err.into();
        assert!(matches!(err, ProvisionError::Io(_)));
    }

    #[test]
    fn precondition_and_config_errors_exit_two() {
        assert_eq!(ProvisionError::NotElevated.exit_code(), 2);
        assert_eq!(
            ProvisionError::ConfigNotFound {
                path: PathBuf::from("missing.yml")
            }
            .exit_code(),
            2
        );
        assert_eq!(
            ProvisionError::Other(anyhow::anyhow!("boom")).exit_code(),
            1
        );
    }
}
