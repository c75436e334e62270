// src/services/mod.rs

//! Service manager interface
//!
//! The engine only needs a narrow slice of the init system: render a unit,
//! enable/disable it, start/stop/kill it and reload the daemon. `Systemctl`
//! is the systemd implementation; tests substitute a recording fake.

mod systemctl;
mod unit;

pub use systemctl::{Systemctl, compute_relative_unit_path, parse_systemd_install_section};
pub use unit::{ServiceDescription, render_unit_file};

use crate::error::Result;
use std::time::Duration;

/// Operations on the init system
pub trait ServiceManager {
    /// Render the text of a unit file
    fn gen_unit_file(&self, desc: &ServiceDescription) -> String {
        render_unit_file(desc)
    }

    fn enable(&self, unit: &str) -> Result<()>;

    fn disable(&self, unit: &str) -> Result<()>;

    fn start(&self, unit: &str) -> Result<()>;

    /// Stop a unit, failing with `Error::ServiceTimeout` when it is still
    /// running after `timeout`
    fn stop(&self, unit: &str, timeout: Duration) -> Result<()>;

    /// Send a signal (e.g. "TERM", "KILL") to every process of the unit
    fn kill(&self, unit: &str, signal: &str) -> Result<()>;

    fn daemon_reload(&self) -> Result<()>;
}
