//! Configuration file discovery and loading.

use crate::config::schema::ProvisionConfig;
use crate::error::{ProvisionError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// System-wide config location.
pub const SYSTEM_CONFIG: &str = "/etc/deskprov/config.yml";

/// Config file name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "deskprov.yml";

/// Candidate configuration files in priority order (first existing wins).
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Explicit `--config` path
    pub explicit: Option<PathBuf>,

    /// ./deskprov.yml
    pub local: Option<PathBuf>,

    /// /etc/deskprov/config.yml
    pub system: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover config files relative to `cwd`.
    pub fn discover(cwd: &Path, explicit: Option<&Path>) -> Self {
        Self::discover_with_system(cwd, explicit, Path::new(SYSTEM_CONFIG))
    }

    /// Discovery with an explicit system config location.
    pub fn discover_with_system(cwd: &Path, explicit: Option<&Path>, system: &Path) -> Self {
        let existing = |p: PathBuf| if p.is_file() { Some(p) } else { None };
        Self {
            explicit: explicit.map(Path::to_path_buf),
            local: existing(cwd.join(LOCAL_CONFIG)),
            system: existing(system.to_path_buf()),
        }
    }

    /// The file that will be loaded, if any.
    pub fn selected(&self) -> Option<&Path> {
        self.explicit
            .as_deref()
            .or(self.local.as_deref())
            .or(self.system.as_deref())
    }
}

/// A configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ProvisionConfig,
    /// Source file, or `None` for built-in defaults
    pub source: Option<PathBuf>,
}

/// Load a single config file and parse it into ProvisionConfig.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<ProvisionConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProvisionError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ProvisionError::Io(e)
        }
    })?;

    parse_config(&content, path)
}

/// Parse YAML content into ProvisionConfig.
///
/// Empty content yields the defaults.
pub fn parse_config(content: &str, source_path: &Path) -> Result<ProvisionConfig> {
    if content.trim().is_empty() {
        return Ok(ProvisionConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| ProvisionError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load the highest-priority config, falling back to defaults.
///
/// An explicit path that does not exist is an error; missing discovered
/// files are not.
pub fn load_config(paths: &ConfigPaths) -> Result<LoadedConfig> {
    match paths.selected() {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            Ok(LoadedConfig {
                config: load_config_file(path)?,
                source: Some(path.to_path_buf()),
            })
        }
        None => {
            tracing::debug!("no config file found, using built-in defaults");
            Ok(LoadedConfig {
                config: ProvisionConfig::default(),
                source: None,
            })
        }
    }
}
