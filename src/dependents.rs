// src/dependents.rs

//! Installed packages and the packages that depend on them
//!
//! A package depends on a framework by listing it under `frameworks` in
//! its descriptor. When a framework changes, the services of its active
//! dependents are stopped around the security policy refresh.

use crate::activate::is_active;
use crate::dirs::Dirs;
use crate::error::Result;
use crate::manifest::{PackageYaml, origin_from_basedir};
use std::path::{Path, PathBuf};
use tracing::warn;

/// An installed version of a package
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledPart {
    pub base_dir: PathBuf,
    pub descriptor: PackageYaml,
    pub origin: String,
}

impl InstalledPart {
    /// Load the installed version at `base_dir`
    pub fn from_version_dir(base_dir: &Path) -> Result<Self> {
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            descriptor: PackageYaml::from_version_dir(base_dir)?,
            origin: origin_from_basedir(base_dir),
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn version(&self) -> &str {
        &self.descriptor.version
    }

    pub fn qualified_name(&self) -> String {
        self.descriptor.qualified_name(&self.origin)
    }

    /// True when the package's `current` symlink resolves to this version
    pub fn is_active(&self) -> bool {
        is_active(&self.base_dir)
    }
}

/// Finds the packages depending on a given package
pub trait DependentResolver {
    fn dependents_of(&self, name: &str) -> Result<Vec<InstalledPart>>;
}

/// Scans the apps directory for versions listing `name` in `frameworks`
#[derive(Debug, Clone)]
pub struct InstalledDependents {
    dirs: Dirs,
}

impl InstalledDependents {
    pub fn new(dirs: &Dirs) -> Self {
        Self { dirs: dirs.clone() }
    }

    /// Every installed version under the apps directory
    pub fn installed(&self) -> Result<Vec<InstalledPart>> {
        let pattern = self.dirs.apps.join("*").join("*");
        let mut parts = Vec::new();

        for dir in glob::glob(&pattern.to_string_lossy())?.filter_map(|e| e.ok()) {
            let skipped = dir
                .file_name()
                .is_some_and(|n| n == "current" || n.to_string_lossy().starts_with('.'));
            if skipped || !dir.is_dir() {
                continue;
            }
            if !dir.join(crate::manifest::DESCRIPTOR_PATH).is_file() {
                continue;
            }
            match InstalledPart::from_version_dir(&dir) {
                Ok(part) => parts.push(part),
                Err(e) => warn!("Ignoring {}: {}", dir.display(), e),
            }
        }

        Ok(parts)
    }
}

impl DependentResolver for InstalledDependents {
    fn dependents_of(&self, name: &str) -> Result<Vec<InstalledPart>> {
        Ok(self
            .installed()?
            .into_iter()
            .filter(|part| part.descriptor.frameworks.iter().any(|f| f == name))
            .collect())
    }
}
