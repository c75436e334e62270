// src/dirs.rs
//! Centralized path derivation for snapkit directories
//!
//! Every location the engine reads or writes hangs off a single root
//! directory ("/" on a live system, a scratch directory in tests or when
//! provisioning an image). A `Dirs` value is built once and handed to every
//! component that touches the filesystem.

use std::path::{Path, PathBuf};

/// Filesystem layout rooted at `root`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirs {
    /// Root filesystem path (usually "/")
    pub root: PathBuf,
    /// Installed package versions: `<apps>/<name>/<version>`
    pub apps: PathBuf,
    /// Generated launcher wrappers
    pub binaries: PathBuf,
    /// Generated systemd units
    pub services: PathBuf,
    /// Generated seccomp profiles
    pub seccomp: PathBuf,
    /// D-Bus system policy for framework services
    pub bus_policy: PathBuf,
    /// System-wide click hook definitions (`*.hook`)
    pub click_hooks: PathBuf,
    /// System data directories: `<data>/<qualified-name>/<version>`
    pub data: PathBuf,
    /// Glob matching every per-home apps data directory
    pub home_data_glob: PathBuf,
    /// udev rules written for OEM hardware assignment
    pub udev_rules: PathBuf,
    /// Framework-provided apparmor policy
    pub apparmor_policy: PathBuf,
    /// Framework-provided seccomp policy
    pub seccomp_policy: PathBuf,
}

impl Dirs {
    /// Derive the full layout from a root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            apps: root.join("apps"),
            binaries: root.join("apps/bin"),
            services: root.join("etc/systemd/system"),
            seccomp: root.join("var/lib/snappy/seccomp/profiles"),
            bus_policy: root.join("etc/dbus-1/system.d"),
            click_hooks: root.join("usr/share/click/hooks"),
            data: root.join("var/lib/apps"),
            home_data_glob: root.join("home/*/apps"),
            udev_rules: root.join("etc/udev/rules.d"),
            apparmor_policy: root.join("var/lib/apparmor"),
            seccomp_policy: root.join("var/lib/snappy/seccomp"),
            root,
        }
    }

    /// Check if we're operating on the live root
    pub fn is_live_root(&self) -> bool {
        self.root == Path::new("/")
    }

    /// Remove the root prefix from a path
    ///
    /// Generated content (wrappers, units, hook symlinks) must reference
    /// paths as the target system sees them, not as the installer does.
    pub fn strip_root(&self, path: &Path) -> PathBuf {
        if self.is_live_root() {
            return path.to_path_buf();
        }
        match path.strip_prefix(&self.root) {
            Ok(rel) => Path::new("/").join(rel),
            Err(_) => path.to_path_buf(),
        }
    }

    /// Join an absolute in-system path (e.g. a hook pattern) under the root
    pub fn under_root(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    /// Directory holding all versions of a package
    pub fn package_dir(&self, dir_name: &str) -> PathBuf {
        self.apps.join(dir_name)
    }

    /// The `current` symlink of a package, given any of its version dirs
    pub fn current_symlink(version_dir: &Path) -> PathBuf {
        version_dir
            .parent()
            .unwrap_or(Path::new("/"))
            .join("current")
    }
}

impl Default for Dirs {
    fn default() -> Self {
        Self::new("/")
    }
}
