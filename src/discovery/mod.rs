// src/discovery/mod.rs

//! Unit discovery.
//!
//! A *unit* is a subdirectory of the agents root that can be launched on
//! its own. [`resolver`] decides which subdirectories qualify and what
//! command launches each one. Nothing here spawns processes.

use std::fmt;
use std::path::PathBuf;

pub mod resolver;

pub use resolver::{resolve, resolve_with};

/// Canonical unit name type (the unit's directory name).
pub type UnitName = String;

/// Everything needed to launch one unit. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDescriptor {
    pub name: UnitName,
    pub working_dir: PathBuf,
    pub command: String,
    pub args: Vec<String>,
}

impl UnitDescriptor {
    pub fn new(
        name: impl Into<UnitName>,
        working_dir: impl Into<PathBuf>,
        command: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            working_dir: working_dir.into(),
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Command line as a single display string, e.g. `uv run main.py`.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A candidate directory that was skipped. Discovery continues without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitConfigurationWarning {
    pub unit: UnitName,
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for UnitConfigurationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({:?})", self.unit, self.reason, self.path)
    }
}

/// A resolved unit together with the launch file that was picked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredUnit {
    pub descriptor: UnitDescriptor,
    pub launch_file: PathBuf,
}

/// Result of scanning an agents root. Units are sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub units: Vec<DiscoveredUnit>,
    pub warnings: Vec<UnitConfigurationWarning>,
}

impl Discovery {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &UnitDescriptor> {
        self.units.iter().map(|u| &u.descriptor)
    }

    pub fn into_descriptors(self) -> Vec<UnitDescriptor> {
        self.units.into_iter().map(|u| u.descriptor).collect()
    }
}
