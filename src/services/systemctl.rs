// src/services/systemctl.rs

//! systemd implementation of `ServiceManager`
//!
//! On the live root every operation goes through `systemctl`. When the root
//! is a target filesystem (image provisioning, tests), units are enabled and
//! disabled by managing the `<target>.wants` symlinks directly, and runtime
//! operations (start, stop, kill, daemon-reload) are skipped: there is no
//! running init system to talk to.

use super::ServiceManager;
use crate::dirs::Dirs;
use crate::error::{Error, Result};
use std::fs;
use std::os::unix::fs as unix_fs;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info};
use wait_timeout::ChildExt;

/// systemd client bound to a root filesystem
#[derive(Debug, Clone)]
pub struct Systemctl {
    dirs: Dirs,
}

impl Systemctl {
    pub fn new(dirs: &Dirs) -> Self {
        Self { dirs: dirs.clone() }
    }

    fn systemctl(&self, action: &'static str, args: &[&str]) -> Result<()> {
        let output = Command::new("systemctl")
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::ServiceFailed {
                unit: args.last().copied().unwrap_or_default().to_string(),
                action,
                message: format!("failed to run systemctl: {}", e),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::ServiceFailed {
                unit: args.last().copied().unwrap_or_default().to_string(),
                action,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Enable a unit in a target root by creating the `[Install]` symlinks
    fn enable_in_target(&self, unit: &str) -> Result<()> {
        let unit_path = self.dirs.services.join(unit);
        let content = fs::read_to_string(&unit_path).map_err(|e| Error::ServiceFailed {
            unit: unit.to_string(),
            action: "enable",
            message: format!("failed to read {}: {}", unit_path.display(), e),
        })?;

        let wants = parse_systemd_install_section(&content, "WantedBy");
        let requires = parse_systemd_install_section(&content, "RequiredBy");
        if wants.is_empty() && requires.is_empty() {
            debug!("Unit '{}' has no WantedBy/RequiredBy, nothing to enable", unit);
            return Ok(());
        }

        let link_target = compute_relative_unit_path(&unit_path, &self.dirs.root);
        let links = wants
            .iter()
            .map(|t| format!("{}.wants", t))
            .chain(requires.iter().map(|t| format!("{}.requires", t)));

        for dir_name in links {
            let dir = self.dirs.services.join(dir_name);
            fs::create_dir_all(&dir)?;
            let symlink_path = dir.join(unit);
            if fs::symlink_metadata(&symlink_path).is_err() {
                unix_fs::symlink(&link_target, &symlink_path)?;
                debug!("Created symlink: {} -> {}", symlink_path.display(), link_target);
            }
        }

        info!("Enabled systemd unit '{}' in target root", unit);
        Ok(())
    }

    /// Disable a unit in a target root by removing every symlink to it
    fn disable_in_target(&self, unit: &str) -> Result<()> {
        let pattern = self.dirs.services.join("*.*").join(unit);
        for link in glob::glob(&pattern.to_string_lossy())?.filter_map(|e| e.ok()) {
            match fs::remove_file(&link) {
                Ok(()) => debug!("Removed symlink: {}", link.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl ServiceManager for Systemctl {
    fn enable(&self, unit: &str) -> Result<()> {
        if self.dirs.is_live_root() {
            self.systemctl("enable", &["enable", unit])
        } else {
            self.enable_in_target(unit)
        }
    }

    fn disable(&self, unit: &str) -> Result<()> {
        if self.dirs.is_live_root() {
            self.systemctl("disable", &["disable", unit])
        } else {
            self.disable_in_target(unit)
        }
    }

    fn start(&self, unit: &str) -> Result<()> {
        if !self.dirs.is_live_root() {
            debug!("Skipping start of {} for target root", unit);
            return Ok(());
        }
        self.systemctl("start", &["start", unit])
    }

    fn stop(&self, unit: &str, timeout: Duration) -> Result<()> {
        if !self.dirs.is_live_root() {
            debug!("Skipping stop of {} for target root", unit);
            return Ok(());
        }

        let mut child = Command::new("systemctl")
            .args(["stop", unit])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::ServiceFailed {
                unit: unit.to_string(),
                action: "stop",
                message: format!("failed to run systemctl: {}", e),
            })?;

        match child.wait_timeout(timeout)? {
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(Error::ServiceFailed {
                unit: unit.to_string(),
                action: "stop",
                message: format!("systemctl exited with {}", status),
            }),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(Error::ServiceTimeout {
                    unit: unit.to_string(),
                    timeout_secs: timeout.as_secs(),
                })
            }
        }
    }

    fn kill(&self, unit: &str, signal: &str) -> Result<()> {
        if !self.dirs.is_live_root() {
            return Ok(());
        }
        self.systemctl("kill", &["kill", "-s", signal, unit])
    }

    fn daemon_reload(&self) -> Result<()> {
        if !self.dirs.is_live_root() {
            debug!("Skipping daemon-reload for target root installation");
            return Ok(());
        }
        self.systemctl("daemon-reload", &["daemon-reload"])
    }
}

/// Parse systemd unit file [Install] section for WantedBy/RequiredBy
///
/// Returns a list of target units that this unit should be linked to.
pub fn parse_systemd_install_section(content: &str, key: &str) -> Vec<String> {
    let mut results = Vec::new();
    let mut in_install = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('[') {
            in_install = trimmed == "[Install]";
            continue;
        }
        if !in_install {
            continue;
        }

        if let Some(value) = trimmed.strip_prefix(key)
            && let Some(value) = value.strip_prefix('=')
        {
            results.extend(value.split_whitespace().map(str::to_string));
        }
    }

    results
}

/// Symlink target for a unit, as seen from inside the target system
pub fn compute_relative_unit_path(unit_path: &Path, root: &Path) -> String {
    let abs_path = unit_path
        .strip_prefix(root)
        .unwrap_or(unit_path)
        .to_string_lossy()
        .trim_start_matches('/')
        .to_string();

    // links live in <services>/<target>.wants/, i.e. /etc/systemd/system/x.wants
    format!("../../../../{}", abs_path)
}
