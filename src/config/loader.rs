// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{Config, RawConfigFile};
use crate::errors::{Result, ScatterError};

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; defaults and command groups are
/// not resolved yet. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScatterError::ConfigNotFound(path.to_path_buf()));
    }

    let contents = fs::read_to_string(path)?;
    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file and resolve it into validated node descriptors.
///
/// This is the entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies `[defaults]` to every node.
/// - Expands command group references.
/// - Checks names, hosts, ports, timeouts and command lists.
///
/// The returned config remembers where it came from so the engine can keep a
/// copy of it next to the run logs.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;
    let mut config = Config::try_from(raw)?;
    config.source_path = Some(fs::canonicalize(path)?);
    Ok(config)
}
