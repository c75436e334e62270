// src/artifacts/mod.rs

//! Files generated from a package descriptor
//!
//! Activating a version writes, for every declared binary and service:
//!
//! - a launcher wrapper in the binaries directory (`binary`)
//! - a systemd unit, plus a D-Bus policy for framework bus names (`service`)
//! - a seccomp profile (`security`)
//!
//! All of them are named after the package's security profile, so the
//! launcher can find the profile for the app it starts. Writes are
//! idempotent; removing something already gone is success.

mod binary;
mod security;
mod service;

pub use binary::render_binary_wrapper;
pub use service::service_unit_name;

use crate::error::Result;
use crate::manifest::{PackageYaml, origin_from_basedir};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Security profile name for an app: `<qualified-name>_<app>_<version>`
///
/// Slashes in the app name become dashes.
pub fn security_profile_name(m: &PackageYaml, app_name: &str, base_dir: &Path) -> String {
    let cleaned = app_name.replace('/', "-");
    format!(
        "{}_{}_{}",
        m.qualified_name(&origin_from_basedir(base_dir)),
        cleaned,
        m.version
    )
}

/// Write `content` to `path` with `mode`, creating parent directories
pub(crate) fn write_artifact(path: &Path, content: &[u8], mode: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

/// Remove a generated file; true if something was removed
pub(crate) fn remove_artifact(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
