// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file and return the raw, unvalidated `RawConfigFile`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file and validate it.
///
/// Durations are parsed and discovery names are checked here, so the rest
/// of the crate only ever sees a `ConfigFile`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the effective configuration.
///
/// - An explicit path must exist and be valid.
/// - Otherwise `Fleetrun.toml` in the working directory is used if present.
/// - Otherwise built-in defaults apply.
pub fn load_or_default(explicit: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        return load_and_validate(path);
    }

    let fallback = default_config_path();
    if fallback.is_file() {
        debug!(path = ?fallback, "using config file from working directory");
        return load_and_validate(fallback);
    }

    Ok(ConfigFile::default())
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("Fleetrun.toml")
}
