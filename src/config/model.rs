// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::types::RestartMode;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [supervisor]
/// restart = "any-exit"
/// restart_delay = "5s"
/// stop_timeout = "5s"
///
/// [discovery]
/// env_marker = ".venv"
/// manifest_marker = "pyproject.toml"
/// entry_file = "main.py"
/// fallback_entries = ["agent.py"]
/// script_extension = "py"
/// launcher = ["uv", "run"]
/// ```
///
/// Both sections are optional and have defaults matching a directory of
/// `uv`-managed Python agents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub supervisor: RawSupervisorSection,

    #[serde(default)]
    pub discovery: DiscoverySection,
}

/// `[supervisor]` section, durations still as strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSupervisorSection {
    #[serde(default)]
    pub restart: RestartMode,

    #[serde(default = "default_restart_delay")]
    pub restart_delay: String,

    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: String,
}

fn default_restart_delay() -> String {
    "5s".to_string()
}

fn default_stop_timeout() -> String {
    "5s".to_string()
}

impl Default for RawSupervisorSection {
    fn default() -> Self {
        Self {
            restart: RestartMode::default(),
            restart_delay: default_restart_delay(),
            stop_timeout: default_stop_timeout(),
        }
    }
}

/// `[discovery]` section.
///
/// Controls what makes a subdirectory a unit and how its launch command is
/// built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoverySection {
    /// Presence marks an isolated environment (e.g. `.venv`).
    #[serde(default = "default_env_marker")]
    pub env_marker: String,

    /// Presence marks a project manifest (e.g. `pyproject.toml`).
    #[serde(default = "default_manifest_marker")]
    pub manifest_marker: String,

    /// Preferred launch file name.
    #[serde(default = "default_entry_file")]
    pub entry_file: String,

    /// Names tried after `entry_file` and `<dirname>.<ext>`, in order.
    #[serde(default = "default_fallback_entries")]
    pub fallback_entries: Vec<String>,

    /// Extension (without the dot) of unit script files.
    #[serde(default = "default_script_extension")]
    pub script_extension: String,

    /// Program + leading args; the launch file name is appended.
    #[serde(default = "default_launcher")]
    pub launcher: Vec<String>,
}

fn default_env_marker() -> String {
    ".venv".to_string()
}

fn default_manifest_marker() -> String {
    "pyproject.toml".to_string()
}

fn default_entry_file() -> String {
    "main.py".to_string()
}

fn default_fallback_entries() -> Vec<String> {
    vec!["agent.py".to_string()]
}

fn default_script_extension() -> String {
    "py".to_string()
}

fn default_launcher() -> Vec<String> {
    vec!["uv".to_string(), "run".to_string()]
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            env_marker: default_env_marker(),
            manifest_marker: default_manifest_marker(),
            entry_file: default_entry_file(),
            fallback_entries: default_fallback_entries(),
            script_extension: default_script_extension(),
            launcher: default_launcher(),
        }
    }
}

/// Validated supervisor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSection {
    pub restart: RestartMode,
    pub restart_delay: Duration,
    pub stop_timeout: Duration,
}

impl Default for SupervisorSection {
    fn default() -> Self {
        Self {
            restart: RestartMode::Never,
            restart_delay: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// Validated configuration. Only constructible through
/// `ConfigFile::try_from(RawConfigFile)` or `ConfigFile::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub supervisor: SupervisorSection,
    pub discovery: DiscoverySection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        supervisor: SupervisorSection,
        discovery: DiscoverySection,
    ) -> Self {
        Self {
            supervisor,
            discovery,
        }
    }
}
