// src/manifest/mod.rs

//! Package manifests
//!
//! A package carries two descriptions of itself:
//!
//! - the click manifest (`manifest`, JSON) in the archive's control part,
//!   rewritten on install into `.click/info/<name>.manifest` for the
//!   legacy hook consumers
//! - the descriptor (`meta/package.yaml`) listing services, binaries and
//!   integration hooks, which drives everything the engine generates

mod descriptor;
mod whitelist;

pub use descriptor::{
    Binary, DESCRIPTOR_PATH, Hardware, HardwareAssign, Integration, OemConfig, PackageYaml,
    SecurityDefinitions, SecurityPolicyFiles, Service, UdevRule,
};
pub use whitelist::{WHITELIST_PATTERN, Whitelisted, verify_whitelist};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Kind of package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    #[default]
    App,
    Core,
    Framework,
    Oem,
}

impl PackageType {
    /// Framework and OEM packages are never suffixed with their origin
    pub fn is_origin_qualified(&self) -> bool {
        !matches!(self, Self::Framework | Self::Oem)
    }
}

impl std::fmt::Display for PackageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::App => write!(f, "app"),
            Self::Core => write!(f, "core"),
            Self::Framework => write!(f, "framework"),
            Self::Oem => write!(f, "oem"),
        }
    }
}

/// The click (JSON) manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClickManifest {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub architecture: Vec<String>,
    #[serde(default, rename = "type")]
    pub package_type: PackageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, rename = "installed-size", skip_serializing_if = "Option::is_none")]
    pub installed_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hooks: BTreeMap<String, BTreeMap<String, String>>,
}

/// Where the compatibility manifest lives inside a version directory
pub fn click_meta_dir(version_dir: &Path) -> PathBuf {
    version_dir.join(".click").join("info")
}

impl ClickManifest {
    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Read the single compatibility manifest of an installed version
    pub fn from_version_dir(version_dir: &Path) -> Result<Self> {
        let meta_dir = click_meta_dir(version_dir);
        let pattern = meta_dir.join("*.manifest");
        let files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
            .filter_map(|entry| entry.ok())
            .collect();

        if files.len() != 1 {
            return Err(Error::ManifestCount {
                dir: meta_dir,
                count: files.len(),
            });
        }

        let data = fs::read(&files[0])?;
        Self::parse(&data).map_err(|e| Error::parse(&files[0], e))
    }
}

/// Rewrite the archive's manifest with the origin folded into the name
/// and write it as `<meta_dir>/<name>.manifest`
///
/// Returns the path written.
pub fn write_compat_manifest(meta_dir: &Path, manifest_data: &[u8], origin: &str) -> Result<PathBuf> {
    let mut cm = ClickManifest::parse(manifest_data)?;

    if cm.package_type.is_origin_qualified() && !origin.is_empty() {
        cm.name = format!("{}.{}", cm.name, origin);
    }

    let out = serde_json::to_string_pretty(&cm)?;
    let path = meta_dir.join(format!("{}.manifest", cm.name));
    fs::write(&path, out)?;
    Ok(path)
}

/// Recover the origin from a version directory `<apps>/<name>.<origin>/<version>`
///
/// Framework and OEM packages live in an unsuffixed directory and have no
/// origin; an empty string is returned for them.
pub fn origin_from_basedir(basedir: &Path) -> String {
    basedir
        .parent()
        .and_then(|p| p.extension())
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default()
}
