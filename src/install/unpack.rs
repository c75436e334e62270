// src/install/unpack.rs

//! Unpacking package payloads without root privileges
//!
//! When running as root the engine does not extract archives itself. It
//! execs the helper
//! `<helper> internal-unpack <archive> <dest> <root> --user <user>`, which
//! chowns the destination to the unprivileged user, drops to that
//! user and extracts from there.

use crate::archive::{ArchiveHandle, ClickDeb};
use crate::engine::Engine;
use crate::error::{Error, Result};
use nix::unistd::{Gid, Uid, User, chown, geteuid, setgid, setgroups, setuid};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Binary providing the `internal-unpack` entry point
const HELPER_NAME: &str = "snapkit";

/// Fallback when the configured unprivileged user does not exist
const FALLBACK_USER: &str = "nobody";

impl Engine {
    fn should_drop_privileges(&self) -> bool {
        self.config.drop_privileges && geteuid().is_root()
    }

    /// Locate the unpack helper: the configured path, else `snapkit` on PATH
    pub fn unpack_helper(&self) -> Result<PathBuf> {
        if let Some(helper) = &self.config.unpack_helper {
            return if helper.is_file() {
                Ok(helper.clone())
            } else {
                Err(Error::PrivilegeHelperNotFound)
            };
        }
        which::which(HELPER_NAME).map_err(|_| Error::PrivilegeHelperNotFound)
    }

    /// Extract `archive` into `inst_dir`, through the helper when root
    pub(crate) fn unpack_with_drop_privs(
        &self,
        archive: &dyn ArchiveHandle,
        inst_dir: &Path,
    ) -> Result<()> {
        if !self.should_drop_privileges() {
            return archive.unpack_into(inst_dir);
        }

        let helper = self.unpack_helper()?;
        debug!("Unpacking {} via {}", archive.path().display(), helper.display());
        let status = Command::new(&helper)
            .arg("internal-unpack")
            .arg(archive.path())
            .arg(inst_dir)
            .arg(&self.dirs.root)
            .arg("--user")
            .arg(&self.config.unprivileged_user)
            .status()?;

        if !status.success() {
            return Err(Error::UnpackFailed {
                archive: archive.path().to_path_buf(),
                dest: inst_dir.to_path_buf(),
                exit_code: status.code(),
            });
        }
        Ok(())
    }
}

fn lookup_user(name: &str) -> Result<User> {
    for candidate in [name, FALLBACK_USER] {
        if let Some(user) = User::from_name(candidate).map_err(io::Error::from)? {
            return Ok(user);
        }
    }
    Err(Error::Config(format!("no such user: {}", name)))
}

fn drop_privileges(dest: &Path, uid: Uid, gid: Gid) -> Result<()> {
    chown(dest, Some(uid), Some(gid)).map_err(io::Error::from)?;
    setgroups(&[gid]).map_err(io::Error::from)?;
    setgid(gid).map_err(io::Error::from)?;
    setuid(uid).map_err(io::Error::from)?;
    Ok(())
}

/// The `internal-unpack` helper: extract `archive` into `dest` as
/// `unprivileged_user`
///
/// `dest` must lie below `root`. Privileges are only dropped when running
/// as root.
pub fn internal_unpack(archive: &Path, dest: &Path, root: &Path, unprivileged_user: &str) -> Result<()> {
    if !dest.starts_with(root) {
        return Err(Error::InvalidPath(format!(
            "{} is not below {}",
            dest.display(),
            root.display()
        )));
    }

    fs::create_dir_all(dest)?;
    if geteuid().is_root() {
        let user = lookup_user(unprivileged_user)?;
        drop_privileges(dest, user.uid, user.gid)?;
        info!("Dropped privileges to {}", user.name);
    }

    ClickDeb::open(archive)?.unpack_into(dest)
}
