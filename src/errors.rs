// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FleetError {
    /// The agents root is missing or not a directory. Fatal: nothing is
    /// launched.
    #[error("Discovery error: {path:?}: {reason}")]
    Discovery { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A unit's process could not be spawned.
    #[error("Launch error for unit '{unit}': {message}")]
    Launch {
        unit: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading a unit's output failed. Logged, never fatal for the unit.
    #[error("Stream error for unit '{unit}': {source}")]
    Stream {
        unit: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FleetError {
    pub fn discovery(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        FleetError::Discovery {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a launch error, naming the missing program when the OS reports
    /// `NotFound`.
    pub fn launch(unit: impl Into<String>, program: &str, source: std::io::Error) -> Self {
        let message = if source.kind() == std::io::ErrorKind::NotFound {
            format!("'{program}' command not found; is it installed and on PATH?")
        } else {
            format!("failed to spawn '{program}': {source}")
        };
        FleetError::Launch {
            unit: unit.into(),
            message,
            source,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FleetError>;
