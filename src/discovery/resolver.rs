// src/discovery/resolver.rs

//! Unit descriptor resolution.
//!
//! A subdirectory of the root is a candidate iff it contains both the
//! environment marker and the manifest marker. For each candidate the launch
//! file is the first existing file among:
//!
//! 1. `entry_file` (e.g. `main.py`)
//! 2. `<dirname>.<ext>`
//! 3. each of `fallback_entries`, in order
//! 4. the lexicographically first `*.<ext>` file in the directory
//!
//! Candidates with no launch file are skipped with a warning.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::DiscoverySection;
use crate::discovery::{DiscoveredUnit, Discovery, UnitConfigurationWarning, UnitDescriptor};
use crate::errors::{FleetError, Result};
use crate::fs::{FileSystem, RealFileSystem};

/// Scan `root` on the real filesystem.
pub fn resolve(root: &Path, section: &DiscoverySection) -> Result<Discovery> {
    resolve_with(&RealFileSystem, root, section)
}

/// Scan `root` through the given filesystem.
///
/// Fails only when `root` is missing or not a directory. An empty result is
/// a valid outcome.
pub fn resolve_with(
    fs: &dyn FileSystem,
    root: &Path,
    section: &DiscoverySection,
) -> Result<Discovery> {
    if !fs.exists(root) {
        return Err(FleetError::discovery(root, "agents directory does not exist"));
    }
    if !fs.is_dir(root) {
        return Err(FleetError::discovery(root, "agents path is not a directory"));
    }

    let mut entries = fs
        .read_dir(root)
        .map_err(|e| FleetError::discovery(root, format!("cannot list directory: {e:#}")))?;
    entries.sort();

    let mut discovery = Discovery::default();

    for dir in entries.into_iter().filter(|p| fs.is_dir(p)) {
        let Some(name) = dir_name(&dir) else {
            debug!(path = ?dir, "skipping directory with non UTF-8 name");
            continue;
        };

        if !is_candidate(fs, &dir, section) {
            debug!(unit = %name, "not a unit: missing environment or manifest marker");
            continue;
        }

        match find_launch_file(fs, &dir, &name, section) {
            Some(launch_file) => {
                let descriptor = build_descriptor(&name, &dir, &launch_file, section);
                debug!(
                    unit = %name,
                    command = %descriptor.command_line(),
                    "resolved unit"
                );
                discovery.units.push(DiscoveredUnit {
                    descriptor,
                    launch_file,
                });
            }
            None => {
                let warning = UnitConfigurationWarning {
                    unit: name,
                    path: dir,
                    reason: format!("no launch file found (*.{})", section.script_extension),
                };
                warn!(
                    unit = %warning.unit,
                    path = ?warning.path,
                    "skipping unit: {}",
                    warning.reason
                );
                discovery.warnings.push(warning);
            }
        }
    }

    Ok(discovery)
}

fn dir_name(dir: &Path) -> Option<String> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
}

fn is_candidate(fs: &dyn FileSystem, dir: &Path, section: &DiscoverySection) -> bool {
    fs.exists(&dir.join(&section.env_marker)) && fs.exists(&dir.join(&section.manifest_marker))
}

fn find_launch_file(
    fs: &dyn FileSystem,
    dir: &Path,
    name: &str,
    section: &DiscoverySection,
) -> Option<PathBuf> {
    let own_name = format!("{name}.{}", section.script_extension);

    let preferred = std::iter::once(section.entry_file.as_str())
        .chain(std::iter::once(own_name.as_str()))
        .chain(section.fallback_entries.iter().map(String::as_str))
        .map(|file| dir.join(file))
        .find(|path| fs.is_file(path));

    preferred.or_else(|| first_script(fs, dir, &section.script_extension))
}

fn first_script(fs: &dyn FileSystem, dir: &Path, ext: &str) -> Option<PathBuf> {
    let mut scripts: Vec<PathBuf> = fs
        .read_dir(dir)
        .ok()?
        .into_iter()
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(ext))
        .filter(|p| fs.is_file(p))
        .collect();
    scripts.sort();
    scripts.into_iter().next()
}

fn build_descriptor(
    name: &str,
    dir: &Path,
    launch_file: &Path,
    section: &DiscoverySection,
) -> UnitDescriptor {
    match section.launcher.split_first() {
        Some((program, leading)) => {
            // Runs inside the unit dir, so the bare file name is enough.
            let file_name = launch_file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let args = leading.iter().cloned().chain(std::iter::once(file_name));
            UnitDescriptor::new(name, dir, program.clone(), args)
        }
        None => UnitDescriptor::new(
            name,
            dir,
            launch_file.to_string_lossy().into_owned(),
            Vec::<String>::new(),
        ),
    }
}
