// src/services/unit.rs

//! systemd unit rendering for package services

use std::fmt::Write;
use std::time::Duration;

/// Everything needed to render a service unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDescription {
    pub app_name: String,
    pub service_name: String,
    pub version: String,
    pub description: String,
    /// Version directory as seen by the target system
    pub app_path: String,
    pub start: String,
    pub stop: String,
    pub poststop: String,
    pub stop_timeout: Duration,
    pub security_profile: String,
    pub is_framework: bool,
    pub bus_name: Option<String>,
    /// Qualified name used for udev tagging and temp dirs
    pub udev_app_name: String,
    /// Confinement launcher binary
    pub launcher: String,
}

impl ServiceDescription {
    fn launch(&self, command: &str) -> String {
        format!(
            "{} {} {} {}/{}",
            self.launcher, self.udev_app_name, self.security_profile, self.app_path, command
        )
    }
}

/// Render the unit file text for a service
pub fn render_unit_file(desc: &ServiceDescription) -> String {
    let mut out = String::new();

    // writeln! into a String cannot fail
    let _ = writeln!(out, "[Unit]");
    let _ = writeln!(out, "Description={}", desc.description);
    if desc.is_framework {
        let _ = writeln!(out, "Before=snappy-frameworks.target");
        let _ = writeln!(out, "After=snappy-frameworks-pre.target");
        let _ = writeln!(out, "Requires=snappy-frameworks-pre.target");
    } else {
        let _ = writeln!(out, "After=snappy-frameworks.target");
        let _ = writeln!(out, "Requires=snappy-frameworks.target");
    }
    let _ = writeln!(out, "X-Snappy=yes");
    let _ = writeln!(out);

    let _ = writeln!(out, "[Service]");
    let _ = writeln!(out, "ExecStart={}", desc.launch(&desc.start));
    let _ = writeln!(out, "Restart=on-failure");
    let _ = writeln!(out, "WorkingDirectory={}", desc.app_path);
    let _ = writeln!(
        out,
        "Environment=\"SNAP_APP={}_{}_{}\" \"TMPDIR=/tmp/snaps/{}/{}/tmp\" \"TEMPDIR=/tmp/snaps/{}/{}/tmp\" \"SNAP_APP_PATH={}\" \"SNAP_APP_DATA_PATH=/var/lib{}\" \"SNAP_APP_USER_DATA_PATH=%h{}\" \"SNAP_NAME={}\" \"SNAP_FULLNAME={}\"",
        desc.app_name,
        desc.service_name,
        desc.version,
        desc.udev_app_name,
        desc.version,
        desc.udev_app_name,
        desc.version,
        desc.app_path,
        desc.app_path,
        desc.app_path,
        desc.app_name,
        desc.udev_app_name,
    );
    if !desc.stop.is_empty() {
        let _ = writeln!(out, "ExecStop={}", desc.launch(&desc.stop));
    }
    if !desc.poststop.is_empty() {
        let _ = writeln!(out, "ExecStopPost={}", desc.launch(&desc.poststop));
    }
    if !desc.stop_timeout.is_zero() {
        let _ = writeln!(out, "TimeoutStopSec={}", desc.stop_timeout.as_secs());
    }
    if let Some(bus_name) = &desc.bus_name {
        let _ = writeln!(out, "BusName={}", bus_name);
        let _ = writeln!(out, "Type=dbus");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "[Install]");
    let _ = writeln!(out, "WantedBy=multi-user.target");

    out
}
