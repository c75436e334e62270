// src/data.rs

//! Per-version package data directories
//!
//! Each version of a package has a system data directory
//! `<data>/<qualified-name>/<version>` and one directory per home under
//! `home/*/apps/<qualified-name>/<version>`. Upgrading copies the old
//! version's directories forward, but never onto a directory that already
//! exists: switching back to a version must not destroy its data.

use crate::dirs::Dirs;
use crate::error::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Data directories of one version, home directories first
pub fn data_dirs(dirs: &Dirs, full_name: &str, version: &str) -> Result<Vec<PathBuf>> {
    let pattern = dirs.home_data_glob.join(full_name).join(version);
    let mut found: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(|e| e.ok())
        .collect();
    found.push(dirs.data.join(full_name).join(version));
    Ok(found)
}

/// Create the system data directory for a first install
pub fn create_data_dir(dirs: &Dirs, full_name: &str, version: &str) -> Result<PathBuf> {
    let dir = dirs.data.join(full_name).join(version);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Copy every data directory of `old_version` to its `new_version` sibling
pub fn copy_data_forward(
    dirs: &Dirs,
    full_name: &str,
    old_version: &str,
    new_version: &str,
) -> Result<()> {
    for old_dir in data_dirs(dirs, full_name, old_version)? {
        let Some(parent) = old_dir.parent() else {
            continue;
        };
        copy_data_directory(&old_dir, &parent.join(new_version))?;
    }
    Ok(())
}

/// `cp -a old new`, only if `old` exists and `new` does not
pub fn copy_data_directory(old_path: &Path, new_path: &Path) -> Result<()> {
    if !old_path.exists() {
        return Ok(());
    }
    if fs::symlink_metadata(new_path).is_ok() {
        debug!("Keeping existing data in {}", new_path.display());
        return Ok(());
    }

    let status = Command::new("cp").arg("-a").arg(old_path).arg(new_path).status()?;
    if !status.success() {
        return Err(Error::DataCopyFailed {
            old_path: old_path.to_path_buf(),
            new_path: new_path.to_path_buf(),
            exit_code: status.code().unwrap_or(-1),
        });
    }
    debug!("Copied data {} -> {}", old_path.display(), new_path.display());
    Ok(())
}

/// Remove every data directory of a version, and its parent if now empty
pub fn remove_data(dirs: &Dirs, full_name: &str, version: &str) -> Result<()> {
    for dir in data_dirs(dirs, full_name, version)? {
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(parent) = dir.parent()
            && let Err(e) = fs::remove_dir(parent)
            && e.kind() != ErrorKind::NotFound
        {
            debug!("Keeping {}: {}", parent.display(), e);
        }
    }
    Ok(())
}
