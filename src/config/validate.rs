// src/config/validate.rs

use std::path::{Component, Path};

use crate::config::model::{ConfigFile, DiscoverySection, RawConfigFile, SupervisorSection};
use crate::errors::{FleetError, Result};
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = FleetError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let supervisor = validate_supervisor(&raw)?;
        validate_discovery(&raw.discovery)?;
        Ok(ConfigFile::new_unchecked(supervisor, raw.discovery))
    }
}

fn validate_supervisor(cfg: &RawConfigFile) -> Result<SupervisorSection> {
    let restart_delay = parse_duration(&cfg.supervisor.restart_delay).map_err(|e| {
        FleetError::ConfigError(format!("[supervisor].restart_delay: {e}"))
    })?;

    let stop_timeout = parse_duration(&cfg.supervisor.stop_timeout).map_err(|e| {
        FleetError::ConfigError(format!("[supervisor].stop_timeout: {e}"))
    })?;

    if stop_timeout.is_zero() {
        return Err(FleetError::ConfigError(
            "[supervisor].stop_timeout must be greater than zero".to_string(),
        ));
    }

    Ok(SupervisorSection {
        restart: cfg.supervisor.restart,
        restart_delay,
        stop_timeout,
    })
}

/// Check the `[discovery]` section for values that would make every unit
/// unresolvable.
pub fn validate_discovery(section: &DiscoverySection) -> Result<()> {
    ensure_plain_file_name("env_marker", &section.env_marker)?;
    ensure_plain_file_name("manifest_marker", &section.manifest_marker)?;
    ensure_plain_file_name("entry_file", &section.entry_file)?;
    for name in &section.fallback_entries {
        ensure_plain_file_name("fallback_entries", name)?;
    }

    let ext = section.script_extension.as_str();
    if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']) {
        return Err(FleetError::ConfigError(format!(
            "[discovery].script_extension must be a bare extension like \"py\" (got {ext:?})"
        )));
    }

    if section.launcher.iter().any(|part| part.trim().is_empty()) {
        return Err(FleetError::ConfigError(
            "[discovery].launcher must not contain empty entries".to_string(),
        ));
    }

    Ok(())
}

fn ensure_plain_file_name(key: &str, value: &str) -> Result<()> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(FleetError::ConfigError(format!(
            "[discovery].{key} must be a plain file name (got {value:?})"
        ))),
    }
}
