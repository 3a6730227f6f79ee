//! Configuration loading, parsing, and validation for deskprov.
//!
//! This module handles all aspects of configuration:
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use deskprov::config::{parse_config, validate};
//! use std::path::Path;
//!
//! let yaml = "packages: [openbox, tint2]\nremote_access:\n  group: crd\n";
//! let config = parse_config(yaml, Path::new("deskprov.yml")).unwrap();
//! validate(&config).unwrap();
//! assert_eq!(config.packages, vec!["openbox", "tint2"]);
//! assert_eq!(config.remote_access.package, "chrome-remote-desktop");
//! ```
//!
//! # Configuration File Locations
//!
//! The first existing file wins; without any, built-in defaults apply:
//! 1. `--config <path>`
//! 2. `./deskprov.yml`
//! 3. `/etc/deskprov/config.yml`

pub mod loader;
pub mod schema;
pub mod validator;

// Schema re-exports
pub use schema::{
    PhasePolicies, ProvisionConfig, RemoteAccessConfig, ServiceConfig, Settings,
    WindowManagerConfig,
};

// Loader re-exports
pub use loader::{load_config, load_config_file, parse_config, ConfigPaths, LoadedConfig};

// Validator re-exports
pub use validator::{validate, validate_config, ValidationError};
