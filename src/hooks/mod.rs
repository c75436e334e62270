// src/hooks/mod.rs

//! System click hooks
//!
//! Hook types are defined system-wide by `*.hook` files in deb822 style:
//!
//! ```text
//! Hook-Name: apparmor
//! Pattern: /var/lib/apparmor/clicks/${id}.json
//! Exec: /usr/bin/aa-clickhook
//! User: root
//! ```
//!
//! A package binds its apps to hook types through the descriptor's
//! `integration` section; see `iter` for how the two meet.

mod iter;

use crate::engine::Engine;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Hook types kept only for compatibility with old packages; never run
pub const IGNORED_HOOKS: [&str; 2] = ["bin-path", "snappy-systemd"];

/// A system-defined hook type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookDefinition {
    pub name: String,
    /// Shell command run after the hook target changed
    pub exec: String,
    pub user: String,
    /// Target path pattern; `${id}` expands to `<name>_<app>_<version>`
    pub pattern: String,
}

/// Parse a single `*.hook` file
///
/// The hook name defaults to the file name up to its first dot.
pub fn read_hook_file(path: &Path) -> Result<HookDefinition> {
    let content = fs::read_to_string(path)?;
    let fields = parse_deb822(&content).map_err(|message| Error::parse(path, message))?;

    let field = |key: &str| fields.get(key).cloned().unwrap_or_default();
    let mut hook = HookDefinition {
        name: field("hook-name"),
        exec: field("exec"),
        user: field("user"),
        pattern: field("pattern"),
    };

    if hook.name.is_empty() {
        hook.name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .and_then(|n| n.split('.').next().map(str::to_string))
            .unwrap_or_default();
    }

    Ok(hook)
}

/// `Key: value` lines with continuation lines; keys are case-insensitive
fn parse_deb822(content: &str) -> std::result::Result<BTreeMap<String, String>, String> {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut last_key: Option<String> = None;

    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with([' ', '\t']) {
            let Some(value) = last_key.as_ref().and_then(|k| fields.get_mut(k)) else {
                return Err(format!("line {}: continuation without a field", lineno + 1));
            };
            value.push('\n');
            value.push_str(line.trim());
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            return Err(format!("line {}: expected 'Key: value'", lineno + 1));
        };
        let key = key.trim().to_lowercase();
        fields.insert(key.clone(), value.trim().to_string());
        last_key = Some(key);
    }

    Ok(fields)
}

/// Every hook type defined in `hooks_dir`, keyed by hook name
///
/// Unreadable or malformed files are logged and skipped.
pub fn system_hooks(hooks_dir: &Path) -> Result<BTreeMap<String, HookDefinition>> {
    let pattern = hooks_dir.join("*.hook");
    let mut hooks = BTreeMap::new();

    for path in glob::glob(&pattern.to_string_lossy())?.filter_map(|e| e.ok()) {
        match read_hook_file(&path) {
            Ok(hook) => {
                hooks.insert(hook.name.clone(), hook);
            }
            Err(e) => warn!("Can't read hook file {}: {}", path.display(), e),
        }
    }

    debug!("Found {} system hooks in {}", hooks.len(), hooks_dir.display());
    Ok(hooks)
}

/// Substitute `${id}` in a hook pattern
pub fn expand_hook_pattern(name: &str, app: &str, version: &str, pattern: &str) -> String {
    let id = format!("{}_{}_{}", name, app, version);
    pattern.replace("${id}", &id)
}

/// Run a hook command through the shell
pub fn exec_hook(command: &str, timeout: Duration) -> Result<()> {
    debug!("Running hook command: {}", command);
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .spawn()?;

    match child.wait_timeout(timeout)? {
        Some(status) if status.success() => Ok(()),
        Some(status) => Err(Error::HookFailed {
            command: command.to_string(),
            exit_code: status.code().unwrap_or(-1),
        }),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(Error::HookTimedOut {
                command: command.to_string(),
                timeout_secs: timeout.as_secs(),
            })
        }
    }
}

impl Engine {
    /// Run every system hook's command once
    ///
    /// Used after provisioning an image with hooks inhibited.
    pub fn run_hooks(&self) -> Result<()> {
        for hook in system_hooks(&self.dirs.click_hooks)?.values() {
            if hook.exec.is_empty() {
                continue;
            }
            info!("Running hook {}", hook.name);
            exec_hook(&hook.exec, self.config.hook_timeout())?;
        }
        Ok(())
    }
}
