// src/activate.rs

//! Making an installed version the active one
//!
//! A package directory holds its versions side by side plus a relative
//! `current` symlink naming the active one:
//!
//! ```text
//! /apps/foo.canonical/1.0/
//! /apps/foo.canonical/2.0/
//! /apps/foo.canonical/current -> 2.0
//! ```
//!
//! The symlink is the only record of which version is active. Activating
//! generates the version's hooks, security profiles, binaries and services
//! before the symlink is switched; deactivating removes them again.

use crate::dirs::Dirs;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::interact::Interacter;
use crate::manifest::{ClickManifest, PackageType, PackageYaml, origin_from_basedir};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs as unix_fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The version directory `<package_dir>/current` points at, if any
///
/// A dangling or missing symlink means no version is active.
pub fn current_active_dir(package_dir: &Path) -> Option<PathBuf> {
    let resolved = fs::canonicalize(package_dir.join("current")).ok()?;
    if !resolved.is_dir() {
        return None;
    }
    Some(package_dir.join(resolved.file_name()?))
}

pub(crate) fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// True if `version_dir` is what its package's `current` resolves to
pub fn is_active(version_dir: &Path) -> bool {
    version_dir
        .parent()
        .and_then(current_active_dir)
        .is_some_and(|current| same_dir(&current, version_dir))
}

impl Engine {
    /// Make `base_dir` the active version of its package
    ///
    /// Does nothing if it already is. A different active version is
    /// deactivated first; if that fails nothing about `base_dir` is
    /// touched. On a later failure the hooks, profiles and files written
    /// so far stay in place for the caller to clean up.
    pub fn set_active(
        &self,
        base_dir: &Path,
        inhibit_hooks: bool,
        inter: &dyn Interacter,
    ) -> Result<()> {
        let parent = base_dir
            .parent()
            .ok_or_else(|| Error::InvalidPath(base_dir.display().to_string()))?;
        let current_symlink = Dirs::current_symlink(base_dir);

        if let Some(current) = current_active_dir(parent) {
            if same_dir(&current, base_dir) {
                return Ok(());
            }
            self.unset_active(&current, inhibit_hooks, inter)?;
        }

        let click = ClickManifest::from_version_dir(base_dir)?;
        let m = PackageYaml::from_version_dir(base_dir)?;
        let origin = origin_from_basedir(base_dir);

        if click.package_type == PackageType::Framework {
            self.framework_policy.install(&m.name, base_dir)?;
        }

        if let Err(e) = self.install_hooks(base_dir, &m, &origin, inhibit_hooks) {
            if let Err(cleanup) = self.remove_hooks(&m, &origin, inhibit_hooks) {
                warn!("Failed to clean up hooks of {}: {}", base_dir.display(), cleanup);
            }
            return Err(e);
        }

        self.add_security_policy(&m, base_dir)?;
        self.add_package_binaries(base_dir)?;
        self.add_package_services(base_dir, inhibit_hooks, inter)?;

        match fs::remove_file(&current_symlink) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", current_symlink.display(), e),
        }

        let version = base_dir
            .file_name()
            .ok_or_else(|| Error::InvalidPath(base_dir.display().to_string()))?;
        unix_fs::symlink(version, &current_symlink)?;
        info!("Activated {} {}", m.name, m.version);
        Ok(())
    }

    /// Deactivate `click_dir`, which must be the active version
    ///
    /// Fails with `NotActive` before touching anything otherwise.
    pub fn unset_active(
        &self,
        click_dir: &Path,
        inhibit_hooks: bool,
        inter: &dyn Interacter,
    ) -> Result<()> {
        if !is_active(click_dir) {
            return Err(Error::NotActive(click_dir.to_path_buf()));
        }
        let current_symlink = Dirs::current_symlink(click_dir);

        self.remove_package_binaries(click_dir)?;
        self.remove_package_services(click_dir, inter)?;

        let m = PackageYaml::from_version_dir(click_dir)?;
        self.remove_security_policy(&m, click_dir)?;

        let click = ClickManifest::from_version_dir(click_dir)?;
        if click.package_type == PackageType::Framework {
            self.framework_policy.remove(&m.name, click_dir)?;
        }

        self.remove_hooks(&m, &origin_from_basedir(click_dir), inhibit_hooks)?;

        if let Err(e) = fs::remove_file(&current_symlink) {
            warn!("Failed to remove {}: {}", current_symlink.display(), e);
        }
        info!("Deactivated {} {}", m.name, m.version);
        Ok(())
    }

    /// Best-effort removal of everything `set_active` may have generated
    /// for a version that never became active
    pub(crate) fn discard_generated(&self, base_dir: &Path, inter: &dyn Interacter) {
        let Ok(m) = PackageYaml::from_version_dir(base_dir) else {
            return;
        };
        let origin = origin_from_basedir(base_dir);

        if let Err(e) = self.remove_package_binaries(base_dir) {
            warn!("Failed to remove binaries of {}: {}", base_dir.display(), e);
        }
        if let Err(e) = self.remove_package_services(base_dir, inter) {
            warn!("Failed to remove services of {}: {}", base_dir.display(), e);
        }
        if let Err(e) = self.remove_security_policy(&m, base_dir) {
            warn!("Failed to remove security policy of {}: {}", base_dir.display(), e);
        }
        let framework = ClickManifest::from_version_dir(base_dir)
            .is_ok_and(|click| click.package_type == PackageType::Framework);
        if framework && let Err(e) = self.framework_policy.remove(&m.name, base_dir)
        {
            warn!("Failed to remove framework policy of {}: {}", m.name, e);
        }
        if let Err(e) = self.remove_hooks(&m, &origin, true) {
            warn!("Failed to remove hooks of {}: {}", base_dir.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interact::SilentInteracter;
    use tempfile::TempDir;

    fn version(engine: &Engine, dir_name: &str, version: &str) -> PathBuf {
        let base = engine.dirs.apps.join(dir_name).join(version);
        fs::create_dir_all(base.join("meta")).unwrap();
        fs::create_dir_all(base.join(".click/info")).unwrap();
        fs::write(
            base.join("meta/package.yaml"),
            format!(
                "name: foo\nversion: \"{}\"\nbinaries:\n  - name: bin/foo\n",
                version
            ),
        )
        .unwrap();
        fs::write(
            base.join(".click/info/foo.sideload.manifest"),
            format!(r#"{{"name": "foo.sideload", "version": "{}"}}"#, version),
        )
        .unwrap();
        base
    }

    #[test]
    fn test_set_active_switches_versions() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Engine::for_root(temp_dir.path());
        let v1 = version(&engine, "foo.sideload", "1.0");
        let v2 = version(&engine, "foo.sideload", "2.0");
        let current = engine.dirs.apps.join("foo.sideload/current");
        let profile_v1 = engine.dirs.seccomp.join("foo.sideload_bin-foo_1.0");

        engine.set_active(&v1, true, &SilentInteracter).unwrap();
        assert_eq!(fs::read_link(&current).unwrap(), Path::new("1.0"));
        assert!(is_active(&v1));
        assert!(profile_v1.exists());

        engine.set_active(&v2, true, &SilentInteracter).unwrap();
        assert_eq!(fs::read_link(&current).unwrap(), Path::new("2.0"));
        assert!(!is_active(&v1));
        assert!(!profile_v1.exists());
        assert!(engine.dirs.seccomp.join("foo.sideload_bin-foo_2.0").exists());
        assert!(fs::read_to_string(engine.dirs.binaries.join("foo.foo"))
            .unwrap()
            .contains("/apps/foo.sideload/2.0/bin/foo"));
    }

    #[test]
    fn test_discard_generated_follows_click_manifest_type() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Engine::for_root(temp_dir.path());
        let base = version(&engine, "foo", "1.0");
        fs::write(
            base.join(".click/info/foo.sideload.manifest"),
            r#"{"name": "foo", "version": "1.0", "type": "framework"}"#,
        )
        .unwrap();
        let group = base.join("meta/framework-policy/seccomp/policygroups");
        fs::create_dir_all(&group).unwrap();
        fs::write(group.join("client"), "read").unwrap();

        engine.framework_policy.install("foo", &base).unwrap();
        let registered = engine.dirs.seccomp_policy.join("policygroups/foo_client");
        assert!(registered.is_file());

        engine.discard_generated(&base, &SilentInteracter);
        assert!(!registered.exists());
    }

    #[test]
    fn test_set_active_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Engine::for_root(temp_dir.path());
        let v1 = version(&engine, "foo.sideload", "1.0");

        engine.set_active(&v1, true, &SilentInteracter).unwrap();
        let before: Vec<_> = fs::read_dir(&engine.dirs.binaries).unwrap().collect();
        engine.set_active(&v1, true, &SilentInteracter).unwrap();
        let after: Vec<_> = fs::read_dir(&engine.dirs.binaries).unwrap().collect();
        assert_eq!(before.len(), after.len());
        assert!(is_active(&v1));
    }

    #[test]
    fn test_unset_inactive_fails_without_changes() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Engine::for_root(temp_dir.path());
        let v1 = version(&engine, "foo.sideload", "1.0");
        let v2 = version(&engine, "foo.sideload", "2.0");
        engine.set_active(&v1, true, &SilentInteracter).unwrap();

        let err = engine.unset_active(&v2, true, &SilentInteracter).unwrap_err();
        assert!(matches!(err, Error::NotActive(_)));
        assert!(is_active(&v1));
        assert!(engine.dirs.binaries.join("foo.foo").exists());
    }

    #[test]
    fn test_unset_without_current() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Engine::for_root(temp_dir.path());
        let v1 = version(&engine, "foo.sideload", "1.0");
        assert!(matches!(
            engine.unset_active(&v1, true, &SilentInteracter),
            Err(Error::NotActive(_))
        ));
    }

    #[test]
    fn test_unset_active() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Engine::for_root(temp_dir.path());
        let v1 = version(&engine, "foo.sideload", "1.0");
        engine.set_active(&v1, true, &SilentInteracter).unwrap();

        engine.unset_active(&v1, true, &SilentInteracter).unwrap();
        assert!(fs::symlink_metadata(engine.dirs.apps.join("foo.sideload/current")).is_err());
        assert!(!engine.dirs.binaries.join("foo.foo").exists());
        assert!(current_active_dir(&engine.dirs.apps.join("foo.sideload")).is_none());
    }

    #[test]
    fn test_dangling_current_is_not_active() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Engine::for_root(temp_dir.path());
        let package_dir = engine.dirs.apps.join("foo.sideload");
        fs::create_dir_all(&package_dir).unwrap();
        unix_fs::symlink("9.9", package_dir.join("current")).unwrap();
        assert!(current_active_dir(&package_dir).is_none());
    }
}
