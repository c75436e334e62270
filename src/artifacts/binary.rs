// src/artifacts/binary.rs

//! Launcher wrappers for declared binaries

use super::{remove_artifact, security_profile_name, write_artifact};
use crate::engine::Engine;
use crate::error::Result;
use crate::manifest::{Binary, PackageType, PackageYaml, origin_from_basedir, verify_whitelist};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Render the shell wrapper that starts `binary` under confinement
///
/// `pkg_path` is the version directory as seen by the target system.
/// Fields are checked against the whitelist before anything is rendered.
pub fn render_binary_wrapper(
    binary: &Binary,
    pkg_path: &Path,
    profile: &str,
    m: &PackageYaml,
    launcher: &str,
) -> Result<String> {
    verify_whitelist(binary)?;

    let origin = origin_from_basedir(pkg_path);
    let udev_app_name = m.qualified_name(&origin);
    let path = pkg_path.display();
    let target = pkg_path.join(&binary.exec);
    let target = target.display();
    let name = &m.name;
    let version = &m.version;

    Ok(format!(
        r#"#!/bin/sh
# !!!never remove this line!!!
##TARGET={target}

set -e

TMPDIR="/tmp/snaps/{udev_app_name}/{version}/tmp"
if [ ! -d "$TMPDIR" ]; then
    mkdir -p -m1777 "$TMPDIR"
fi
export TMPDIR
export TEMPDIR="$TMPDIR"

# app info
export SNAP_NAME="{name}"
export SNAP_ORIGIN="{origin}"
export SNAP_FULLNAME="{udev_app_name}"

# app paths
export SNAP_APP_PATH="{path}"
export SNAP_APP_DATA_PATH="/var/lib{path}"
export SNAP_APP_USER_DATA_PATH="$HOME{path}"
export SNAP_APP_TMPDIR="$TMPDIR"

if [ ! -d "$SNAP_APP_USER_DATA_PATH" ]; then
   mkdir -p "$SNAP_APP_USER_DATA_PATH"
fi
export HOME="$SNAP_APP_USER_DATA_PATH"

export SNAP_OLD_PWD="$(pwd)"
cd {path}
{launcher} {udev_app_name} {profile} {target} "$@"
"#
    ))
}

impl Engine {
    /// Wrapper location: bare binary name for frameworks, `<pkg>.<bin>`
    /// for everything else
    pub(crate) fn binary_wrapper_path(&self, m: &PackageYaml, binary: &Binary) -> PathBuf {
        let file_name = if m.package_type == PackageType::Framework {
            binary.base_name().to_string()
        } else {
            format!("{}.{}", m.name, binary.base_name())
        };
        self.dirs.binaries.join(file_name)
    }

    /// Write a wrapper for every declared binary
    pub fn add_package_binaries(&self, base_dir: &Path) -> Result<()> {
        let m = PackageYaml::from_version_dir(base_dir)?;
        let real_base_dir = self.dirs.strip_root(base_dir);

        for binary in &m.binaries {
            let profile = security_profile_name(&m, &binary.name, base_dir);
            let content =
                render_binary_wrapper(binary, &real_base_dir, &profile, &m, &self.config.launcher)?;
            let path = self.binary_wrapper_path(&m, binary);
            write_artifact(&path, content.as_bytes(), 0o755)?;
            debug!("Wrote binary wrapper {}", path.display());
        }
        Ok(())
    }

    /// Remove the wrappers of every declared binary
    pub fn remove_package_binaries(&self, base_dir: &Path) -> Result<()> {
        let m = PackageYaml::from_version_dir(base_dir)?;
        for binary in &m.binaries {
            remove_artifact(&self.binary_wrapper_path(&m, binary))?;
        }
        Ok(())
    }
}
