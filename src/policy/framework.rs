// src/policy/framework.rs

//! Framework policy registration
//!
//! A framework ships policy groups and templates under
//! `meta/framework-policy/{apparmor,seccomp}/{policygroups,templates}/`.
//! Registering copies each file to the system policy directories, prefixed
//! with `<framework>_` so dependents can reference it unambiguously.

use super::FrameworkPolicy;
use crate::dirs::Dirs;
use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Location of the shipped policy inside a version directory
pub const FRAMEWORK_POLICY_DIR: &str = "meta/framework-policy";

const POLICY_KINDS: [&str; 2] = ["apparmor", "seccomp"];
const POLICY_TYPES: [&str; 2] = ["policygroups", "templates"];

/// Registers framework policy into the `Dirs` policy directories
#[derive(Debug, Clone)]
pub struct FrameworkPolicyDir {
    dirs: Dirs,
}

impl FrameworkPolicyDir {
    pub fn new(dirs: &Dirs) -> Self {
        Self { dirs: dirs.clone() }
    }

    fn system_dir(&self, kind: &str) -> &Path {
        match kind {
            "apparmor" => &self.dirs.apparmor_policy,
            _ => &self.dirs.seccomp_policy,
        }
    }

    /// `(shipped file, installed destination)` for every policy file
    fn policy_files(&self, framework: &str, base_dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
        let mut files = Vec::new();
        for kind in POLICY_KINDS {
            for policy_type in POLICY_TYPES {
                let src_dir = base_dir.join(FRAMEWORK_POLICY_DIR).join(kind).join(policy_type);
                if !src_dir.is_dir() {
                    continue;
                }
                let dest_dir = self.system_dir(kind).join(policy_type);
                for entry in fs::read_dir(&src_dir)? {
                    let entry = entry?;
                    if !entry.file_type()?.is_file() {
                        continue;
                    }
                    let dest_name = format!("{}_{}", framework, entry.file_name().to_string_lossy());
                    files.push((entry.path(), dest_dir.join(dest_name)));
                }
            }
        }
        Ok(files)
    }
}

impl FrameworkPolicy for FrameworkPolicyDir {
    fn install(&self, framework: &str, base_dir: &Path) -> Result<()> {
        for (src, dest) in self.policy_files(framework, base_dir)? {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&src, &dest).map_err(|e| {
                Error::Policy(format!(
                    "failed to install {} as {}: {}",
                    src.display(),
                    dest.display(),
                    e
                ))
            })?;
            debug!("Installed framework policy {}", dest.display());
        }
        Ok(())
    }

    fn remove(&self, framework: &str, base_dir: &Path) -> Result<()> {
        for (_, dest) in self.policy_files(framework, base_dir)? {
            match fs::remove_file(&dest) {
                Ok(()) => debug!("Removed framework policy {}", dest.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to remove {}: {}", dest.display(), e);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}

/// SHA-256 of every file below a version's framework policy tree, keyed by
/// path relative to the tree; empty when the framework ships no policy
pub fn policy_tree_digest(base_dir: &Path) -> Result<BTreeMap<PathBuf, String>> {
    let root = base_dir.join(FRAMEWORK_POLICY_DIR);
    let mut digests = BTreeMap::new();
    if !root.is_dir() {
        return Ok(digests);
    }

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Policy(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let content = fs::read(entry.path())?;
        let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
        digests.insert(rel.to_path_buf(), hex::encode(Sha256::digest(&content)));
    }
    Ok(digests)
}
