// src/config.rs

//! Engine configuration
//!
//! Tunables live in an optional TOML file. Every field has a default, so a
//! missing file (or an empty one) yields a working configuration.
//!
//! ```toml
//! kill_wait_secs = 5
//! hook_timeout_secs = 30
//! verify_command = "debsig-verify"
//! drop_privileges = true
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default location of the configuration file (relative to the root)
pub const DEFAULT_CONFIG_PATH: &str = "/etc/snapkit/config.toml";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds to wait between TERM and KILL for services refusing to stop
    pub kill_wait_secs: u64,
    /// Upper bound for a single hook command
    pub hook_timeout_secs: u64,
    /// Stop timeout used when a service does not declare one
    pub default_stop_timeout_secs: u64,
    /// Command run as `<verify_command> <archive>` to check signatures
    pub verify_command: String,
    /// Explicit path to the privileged unpack helper
    pub unpack_helper: Option<PathBuf>,
    /// Drop privileges for unpacking when running as root
    pub drop_privileges: bool,
    /// User the unpack helper switches to
    pub unprivileged_user: String,
    /// Launcher invoked by wrappers and units to confine the app
    pub launcher: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kill_wait_secs: 5,
            hook_timeout_secs: 30,
            default_stop_timeout_secs: 30,
            verify_command: "debsig-verify".to_string(),
            unpack_helper: None,
            drop_privileges: true,
            unprivileged_user: "clickpkg".to_string(),
            launcher: "ubuntu-core-launcher".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a file, falling back to defaults if absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn kill_wait(&self) -> Duration {
        Duration::from_secs(self.kill_wait_secs)
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_secs)
    }

    pub fn default_stop_timeout(&self) -> Duration {
        Duration::from_secs(self.default_stop_timeout_secs)
    }
}
