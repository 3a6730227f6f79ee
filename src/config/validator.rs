//! Configuration validation rules.
//!
//! - Package names must be valid Debian package names
//! - Group names must be valid POSIX group names
//! - A signing key pin must be a 64-digit hex SHA-256
//! - The session command must be a single non-empty line
//! - Home-relative paths must be relative and stay inside the home directory

use crate::config::schema::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use regex::Regex;
use std::path::{Component, Path};
use std::sync::LazyLock;

static PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9+.\-]+$").unwrap_or_else(|_| unreachable!()));

static GROUP_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_\-]*$").unwrap_or_else(|_| unreachable!()));

static SHA256_HEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{64}$").unwrap_or_else(|_| unreachable!()));

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    fn new(rule: &str, message: String) -> Self {
        Self {
            rule: rule.to_string(),
            message,
        }
    }
}

/// Validate a configuration and return all errors.
///
/// This function collects all validation errors rather than stopping
/// at the first one, allowing users to fix multiple issues at once.
pub fn validate_config(config: &ProvisionConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_packages(config));
    errors.extend(validate_remote_access(config));
    errors.extend(validate_window_manager(config));

    if config.service.unit_prefix.trim().is_empty() {
        errors.push(ValidationError::new(
            "empty-unit",
            "service.unit_prefix must not be empty".to_string(),
        ));
    }

    errors
}

fn validate_packages(config: &ProvisionConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for name in config
        .packages
        .iter()
        .chain(std::iter::once(&config.remote_access.package))
    {
        if !PACKAGE_NAME.is_match(name) {
            errors.push(ValidationError::new(
                "invalid-package",
                format!("'{}' is not a valid package name", name),
            ));
        }
    }

    errors
}

fn validate_remote_access(config: &ProvisionConfig) -> Vec<ValidationError> {
    let remote = &config.remote_access;
    let mut errors = Vec::new();

    if !GROUP_NAME.is_match(&remote.group) {
        errors.push(ValidationError::new(
            "invalid-group",
            format!("'{}' is not a valid group name", remote.group),
        ));
    }

    if let Some(pin) = &remote.key_sha256 {
        if !SHA256_HEX.is_match(pin.trim()) {
            errors.push(ValidationError::new(
                "invalid-key-pin",
                "remote_access.key_sha256 must be 64 hex digits".to_string(),
            ));
        }
    }

    if !(remote.key_url.starts_with("https://") || remote.key_url.starts_with("http://")) {
        errors.push(ValidationError::new(
            "invalid-key-url",
            format!("'{}' is not an http(s) URL", remote.key_url),
        ));
    }

    if !remote.keyring.is_absolute() || !remote.list_file.is_absolute() {
        errors.push(ValidationError::new(
            "relative-system-path",
            "remote_access.keyring and remote_access.list_file must be absolute".to_string(),
        ));
    }

    errors
}

fn validate_window_manager(config: &ProvisionConfig) -> Vec<ValidationError> {
    let wm = &config.window_manager;
    let mut errors = Vec::new();

    let command = wm.session_command.trim();
    if command.is_empty() || command.contains(['\n', '\r']) {
        errors.push(ValidationError::new(
            "invalid-session-command",
            "window_manager.session_command must be a single non-empty line".to_string(),
        ));
    }

    if wm.config_dir.is_absolute() || wm.session_file.is_absolute() {
        errors.push(ValidationError::new(
            "absolute-home-path",
            "window_manager.config_dir and window_manager.session_file are relative to the home directory".to_string(),
        ));
    }

    let escapes = |path: &Path| path.components().any(|c| c == Component::ParentDir);
    if escapes(&wm.config_dir) || escapes(&wm.session_file) {
        errors.push(ValidationError::new(
            "home-path-escape",
            "window_manager.config_dir and window_manager.session_file must not contain '..'"
                .to_string(),
        ));
    }

    for file in &wm.config_files {
        if file.is_empty() || file.contains('/') || file == "." || file == ".." {
            errors.push(ValidationError::new(
                "invalid-config-file",
                format!("'{}' must be a plain file name", file),
            ));
        }
    }

    errors
}

/// Validate configuration and return the first error as a Result.
pub fn validate(config: &ProvisionConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(ProvisionError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
