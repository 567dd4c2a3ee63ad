#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use fleetrun::discovery::UnitDescriptor;
use tempfile::TempDir;

/// Builds an on-disk agents root inside a temp directory.
///
/// ```ignore
/// let tree = UnitTreeBuilder::new()
///     .unit("alpha", &["main.py"])
///     .bare_dir("notes")
///     .build();
/// ```
pub struct UnitTreeBuilder {
    dir: TempDir,
}

impl UnitTreeBuilder {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("creating temp dir"),
        }
    }

    /// A complete unit: `.venv/`, `pyproject.toml`, plus the given files.
    pub fn unit(self, name: &str, files: &[&str]) -> Self {
        let unit_dir = self.dir.path().join(name);
        fs::create_dir_all(unit_dir.join(".venv")).expect("creating .venv");
        fs::write(unit_dir.join("pyproject.toml"), "[project]\n").expect("writing manifest");
        for file in files {
            fs::write(unit_dir.join(file), "").expect("writing unit file");
        }
        self
    }

    /// A directory with only the given files (no markers).
    pub fn bare_dir(self, name: &str, files: &[&str]) -> Self {
        let dir = self.dir.path().join(name);
        fs::create_dir_all(&dir).expect("creating dir");
        for file in files {
            fs::write(dir.join(file), "").expect("writing file");
        }
        self
    }

    pub fn build(self) -> UnitTree {
        UnitTree { dir: self.dir }
    }
}

impl Default for UnitTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the temp directory alive for the duration of a test.
pub struct UnitTree {
    dir: TempDir,
}

impl UnitTree {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn unit_dir(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Descriptor running `script` through `sh -c` in the system temp dir.
pub fn sh_unit(name: &str, script: &str) -> UnitDescriptor {
    UnitDescriptor::new(name, std::env::temp_dir(), "sh", ["-c", script])
}
