//! Configuration loading shared by the commands that build a plan.

use std::path::Path;

use crate::config::{load_config, validate, ConfigPaths, LoadedConfig};
use crate::error::Result;

/// Discover, load, and validate the configuration.
pub fn load_checked_config(cwd: &Path, explicit: Option<&Path>) -> Result<LoadedConfig> {
    let paths = ConfigPaths::discover(cwd, explicit);
    let loaded = load_config(&paths)?;
    validate(&loaded.config)?;
    Ok(loaded)
}
