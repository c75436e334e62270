// src/install/mod.rs

//! Installing and removing package versions
//!
//! `install_click` is a sequence of steps, each of which may register a
//! compensation. When a later step fails the registered compensations run
//! in reverse order, so that a failed install leaves the package directory,
//! the active version and the data directories as they were before.
//!
//! Steps:
//! 1. open and verify the archive, check it may be installed
//! 2. replace the udev rules of OEM packages
//! 3. create the version directory and unpack the payload into it
//! 4. write the compatibility manifest and the payload hashes
//! 5. deactivate the previous version and copy its data forward
//! 6. activate the new version
//! 7. refresh the services and policy of dependent packages
//!
//! Reinstalling a version that is already on disk moves the existing
//! directory aside first (deactivating it if needed) and only deletes the
//! moved copy once everything else succeeded.

mod part;
mod refresh;
mod unpack;

pub use part::SnapPart;
pub use unpack::internal_unpack;

use crate::activate::{current_active_dir, is_active, same_dir};
use crate::data::{copy_data_forward, create_data_dir, data_dirs, remove_data};
use crate::dirs::Dirs;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::interact::Interacter;
use crate::manifest::{PackageType, PackageYaml, click_meta_dir, origin_from_basedir, write_compat_manifest};
use bitflags::bitflags;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

bitflags! {
    /// Options for `install_click`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InstallFlags: u32 {
        /// Skip signature verification of the archive
        const ALLOW_UNAUTHENTICATED = 1 << 0;
        /// Skip hook commands, service starts and dependent refreshes
        const INHIBIT_HOOKS = 1 << 1;
        /// Permit OEM packages
        const ALLOW_OEM = 1 << 2;
    }
}

/// Undo action registered by an install step
#[derive(Debug)]
enum Compensation {
    /// Delete a version directory created by the install
    RemoveBaseDir(PathBuf),
    /// Put back a version directory that was moved aside for a reinstall
    RestoreBaseDir { dir: PathBuf, backup: PathBuf },
    /// Re-render the udev rules of the previously active OEM version, or
    /// drop the new ones when there was none
    RestoreUdevRules {
        installed: PackageYaml,
        previous: Option<PackageYaml>,
    },
    /// Make a previously active version active again
    Reactivate(PathBuf),
    /// Deactivate the newly activated version
    Deactivate(PathBuf),
    /// Delete data directories of a version that did not exist before
    RemoveNewData {
        full_name: String,
        version: String,
        preexisting: Vec<PathBuf>,
    },
}

/// Compensations of one install, run last-in first-out
struct Rollback<'a> {
    engine: &'a Engine,
    inhibit_hooks: bool,
    inter: &'a dyn Interacter,
    steps: Vec<Compensation>,
}

impl<'a> Rollback<'a> {
    fn new(engine: &'a Engine, inhibit_hooks: bool, inter: &'a dyn Interacter) -> Self {
        Self {
            engine,
            inhibit_hooks,
            inter,
            steps: Vec::new(),
        }
    }

    fn push(&mut self, step: Compensation) {
        debug!("Registered compensation {:?}", step);
        self.steps.push(step);
    }

    fn run(mut self) {
        while let Some(step) = self.steps.pop() {
            if let Err(e) = self.undo(&step) {
                warn!("Rollback step {:?} failed: {}", step, e);
            }
        }
    }

    fn undo(&self, step: &Compensation) -> Result<()> {
        match step {
            Compensation::RemoveBaseDir(dir) => {
                match fs::remove_dir_all(dir) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                // package directory of a first install
                if let Some(parent) = dir.parent() {
                    let _ = fs::remove_dir(parent);
                }
                Ok(())
            }
            Compensation::RestoreBaseDir { dir, backup } => {
                match fs::remove_dir_all(dir) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                fs::rename(backup, dir)?;
                Ok(())
            }
            Compensation::RestoreUdevRules {
                installed,
                previous,
            } => match previous {
                Some(previous) => self.engine.install_oem_hardware_udev_rules(previous),
                None => self.engine.remove_oem_hardware_udev_rules(installed),
            },
            Compensation::Reactivate(dir) => self.engine.reactivate(dir, self.inhibit_hooks, self.inter),
            Compensation::Deactivate(dir) => {
                if is_active(dir) {
                    self.engine.unset_active(dir, self.inhibit_hooks, self.inter)?;
                }
                Ok(())
            }
            Compensation::RemoveNewData {
                full_name,
                version,
                preexisting,
            } => {
                for dir in data_dirs(&self.engine.dirs, full_name, version)? {
                    if preexisting.contains(&dir) {
                        continue;
                    }
                    match fs::remove_dir_all(&dir) {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                    if let Some(parent) = dir.parent() {
                        let _ = fs::remove_dir(parent);
                    }
                }
                Ok(())
            }
        }
    }
}

fn existing_data_dirs(dirs: &Dirs, full_name: &str, version: &str) -> Result<Vec<PathBuf>> {
    Ok(data_dirs(dirs, full_name, version)?
        .into_iter()
        .filter(|d| d.exists())
        .collect())
}

/// Where an existing version directory is kept during a reinstall
fn reinstall_backup(base_dir: &Path) -> PathBuf {
    let version = base_dir.file_name().unwrap_or_default().to_string_lossy();
    base_dir.with_file_name(format!(".{}.previous", version))
}

/// True if `package_dir` still holds any version directory
fn has_versions(package_dir: &Path) -> bool {
    fs::read_dir(package_dir).is_ok_and(|entries| {
        entries.filter_map(|e| e.ok()).any(|e| {
            let name = e.file_name();
            name != "current"
                && !name.to_string_lossy().starts_with('.')
                && e.file_type().is_ok_and(|t| t.is_dir())
        })
    })
}

impl Engine {
    /// Install the package archive at `archive_path` and make it active
    ///
    /// Returns the package name.
    pub fn install_click(
        &self,
        archive_path: &Path,
        flags: InstallFlags,
        inter: &dyn Interacter,
        origin: &str,
    ) -> Result<String> {
        let part = self.open_snap(
            archive_path,
            origin,
            flags.contains(InstallFlags::ALLOW_UNAUTHENTICATED),
        )?;
        self.can_install(&part, flags.contains(InstallFlags::ALLOW_OEM), inter)?;

        let manifest_data = part.archive().control_member("manifest")?;

        let inhibit_hooks = flags.contains(InstallFlags::INHIBIT_HOOKS);
        let mut rollback = Rollback::new(self, inhibit_hooks, inter);

        match self.install_steps(&part, &manifest_data, inhibit_hooks, inter, &mut rollback) {
            Ok(()) => {
                info!("Installed {} {}", part.name(), part.version());
                Ok(part.name().to_string())
            }
            Err(e) => {
                warn!("Installing {} failed, rolling back: {}", part.name(), e);
                rollback.run();
                Err(e)
            }
        }
    }

    fn install_steps(
        &self,
        part: &SnapPart,
        manifest_data: &[u8],
        inhibit_hooks: bool,
        inter: &dyn Interacter,
        rollback: &mut Rollback<'_>,
    ) -> Result<()> {
        let base_dir = &part.base_dir;
        let full_name = part.qualified_name();
        let old_dir = base_dir.parent().and_then(current_active_dir);
        let old = old_dir
            .as_deref()
            .map(PackageYaml::from_version_dir)
            .transpose()?;
        let reinstall = old_dir.as_deref().is_some_and(|d| same_dir(d, base_dir));

        if part.package_type() == PackageType::Oem {
            rollback.push(Compensation::RestoreUdevRules {
                installed: part.descriptor.clone(),
                previous: old.clone(),
            });
            self.install_oem_hardware_udev_rules(&part.descriptor)?;
        }

        let mut backup = None;
        if base_dir.exists() {
            if reinstall {
                rollback.push(Compensation::Reactivate(base_dir.clone()));
                self.unset_active(base_dir, inhibit_hooks, inter)?;
            }
            let aside = reinstall_backup(base_dir);
            if aside.exists() {
                fs::remove_dir_all(&aside)?;
            }
            fs::rename(base_dir, &aside)?;
            rollback.push(Compensation::RestoreBaseDir {
                dir: base_dir.clone(),
                backup: aside.clone(),
            });
            fs::create_dir_all(base_dir)?;
            backup = Some(aside);
        } else {
            fs::create_dir_all(base_dir)?;
            rollback.push(Compensation::RemoveBaseDir(base_dir.clone()));
        }

        self.unpack_with_drop_privs(part.archive(), base_dir)?;

        let meta_dir = click_meta_dir(base_dir);
        fs::create_dir_all(&meta_dir)?;
        write_compat_manifest(&meta_dir, manifest_data, &part.origin)?;
        part.archive().extract_hashes(&base_dir.join("meta"))?;

        let preexisting = existing_data_dirs(&self.dirs, &full_name, part.version())?;
        rollback.push(Compensation::RemoveNewData {
            full_name: full_name.clone(),
            version: part.version().to_string(),
            preexisting,
        });

        match (&old_dir, &old) {
            (Some(old_dir), Some(old)) if !reinstall => {
                rollback.push(Compensation::Reactivate(old_dir.clone()));
                self.unset_active(old_dir, inhibit_hooks, inter)?;
                copy_data_forward(&self.dirs, &full_name, &old.version, part.version())?;
            }
            _ => {
                create_data_dir(&self.dirs, &full_name, part.version())?;
            }
        }

        if let Err(e) = self.set_active(base_dir, inhibit_hooks, inter) {
            self.discard_generated(base_dir, inter);
            return Err(e);
        }
        rollback.push(Compensation::Deactivate(base_dir.clone()));

        if !inhibit_hooks {
            // a reinstalled version's previous content is the moved copy
            let previous = if reinstall { backup.as_deref() } else { old_dir.as_deref() };
            self.refresh_dependents(part, previous, inter)?;
        }

        if let Some(backup) = backup
            && let Err(e) = fs::remove_dir_all(&backup)
        {
            warn!("Failed to remove {}: {}", backup.display(), e);
        }
        Ok(())
    }

    /// Make `dir` active again with freshly generated artifacts
    ///
    /// A version whose deactivation failed halfway is still what `current`
    /// points at; the symlink is dropped first so that everything is
    /// regenerated.
    fn reactivate(&self, dir: &Path, inhibit_hooks: bool, inter: &dyn Interacter) -> Result<()> {
        if is_active(dir) {
            fs::remove_file(Dirs::current_symlink(dir))?;
        }
        self.set_active(dir, inhibit_hooks, inter)
    }

    /// Remove the installed version at `dir`
    ///
    /// Deactivates it if active, then deletes the version directory and its
    /// data directories. The udev rules of an OEM package go with its
    /// active version, or with the last version left.
    pub fn remove_click(&self, dir: &Path, inter: &dyn Interacter) -> Result<()> {
        let m = PackageYaml::from_version_dir(dir)?;
        let origin = origin_from_basedir(dir);
        let was_active = is_active(dir);

        if was_active {
            self.unset_active(dir, false, inter)?;
        } else {
            self.remove_hooks(&m, &origin, false)?;
        }

        fs::remove_dir_all(dir)?;
        if let Some(parent) = dir.parent()
            && let Err(e) = fs::remove_dir(parent)
        {
            debug!("Keeping {}: {}", parent.display(), e);
        }

        remove_data(&self.dirs, &m.qualified_name(&origin), &m.version)?;
        let last_version = !dir.parent().is_some_and(has_versions);
        if m.package_type == PackageType::Oem && (was_active || last_version) {
            self.remove_oem_hardware_udev_rules(&m)?;
        }

        info!("Removed {} {}", m.name, m.version);
        Ok(())
    }

    /// Version directory of an installed package
    ///
    /// `name` is either a package directory name (`foo.canonical`) or a
    /// bare package name, matched against every origin.
    pub fn find_version_dir(&self, name: &str, version: &str) -> Result<PathBuf> {
        let direct = self.dirs.package_dir(name).join(version);
        if direct.is_dir() {
            return Ok(direct);
        }

        let pattern = self.dirs.apps.join(format!("{}.*", name)).join(version);
        glob::glob(&pattern.to_string_lossy())?
            .filter_map(|e| e.ok())
            .find(|p| p.is_dir())
            .ok_or_else(|| Error::InvalidPath(format!("{} {} is not installed", name, version)))
    }

    /// Active version directory of an installed package
    pub fn find_active_dir(&self, name: &str) -> Result<PathBuf> {
        let direct = current_active_dir(&self.dirs.package_dir(name));
        if let Some(dir) = direct {
            return Ok(dir);
        }

        let pattern = self.dirs.apps.join(format!("{}.*", name));
        glob::glob(&pattern.to_string_lossy())?
            .filter_map(|e| e.ok())
            .find_map(|p| current_active_dir(&p))
            .ok_or_else(|| Error::InvalidPath(format!("{} has no active version", name)))
    }
}
