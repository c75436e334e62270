// src/oem.rs

//! udev rules for OEM hardware assignment
//!
//! An OEM package hands devices to parts:
//!
//! ```yaml
//! oem:
//!   hardware:
//!     assign:
//!       - part-id: device-hive-iot-hal
//!         rules:
//!           - kernel: ttyUSB0
//!           - subsystem: tty
//!             with-attrs: [idVendor=0403]
//! ```
//!
//! Every assignment becomes `80-snappy_<oem>_<part-id>.rules`, tagging the
//! matching devices for the launcher.

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::manifest::{DESCRIPTOR_PATH, HardwareAssign, PackageYaml, UdevRule};
use std::fs;
use std::process::Command;
use tracing::{debug, info};

fn split_key_value(entry: &str) -> Result<(&str, &str)> {
    entry.split_once('=').ok_or_else(|| {
        Error::parse(
            DESCRIPTOR_PATH,
            format!("expected key=value in hardware rule, got {:?}", entry),
        )
    })
}

/// One udev rule line for a device assigned to `part_id`
pub fn udev_rule_line(part_id: &str, rule: &UdevRule) -> Result<String> {
    let mut s = String::new();
    if let Some(kernel) = &rule.kernel {
        s.push_str(&format!(r#"KERNEL=="{}", "#, kernel));
    }
    if let Some(subsystem) = &rule.subsystem {
        s.push_str(&format!(r#"SUBSYSTEM=="{}", "#, subsystem));
    }
    if let Some(subsystems) = &rule.with_subsystems {
        s.push_str(&format!(r#"SUBSYSTEMS=="{}", "#, subsystems));
    }
    if let Some(driver) = &rule.with_driver {
        s.push_str(&format!(r#"DRIVER=="{}", "#, driver));
    }
    for attr in &rule.with_attrs {
        let (key, value) = split_key_value(attr)?;
        s.push_str(&format!(r#"ATTRS{{{}}}=="{}", "#, key, value));
    }
    for prop in &rule.with_props {
        let (key, value) = split_key_value(prop)?;
        s.push_str(&format!(r#"ENV{{{}}}=="{}", "#, key, value));
    }
    s.push_str(&format!(
        r#"TAG:="snappy-assign", ENV{{SNAPPY_APP}}:="{}""#,
        part_id
    ));
    Ok(s)
}

/// Complete rules file for one assignment
pub fn udev_rules_content(assign: &HardwareAssign) -> Result<String> {
    let mut out = String::new();
    for rule in &assign.rules {
        out.push_str(&udev_rule_line(&assign.part_id, rule)?);
        out.push('\n');
    }
    Ok(out)
}

impl Engine {
    /// Replace the OEM package's udev rules and ask udev to apply them
    pub fn install_oem_hardware_udev_rules(&self, m: &PackageYaml) -> Result<()> {
        fs::create_dir_all(&self.dirs.udev_rules)?;
        self.remove_oem_hardware_udev_rules(m)?;

        let assignments = m.oem.as_ref().map(|o| o.hardware.assign.as_slice()).unwrap_or_default();
        for assign in assignments {
            let content = udev_rules_content(assign)?;
            let path = self
                .dirs
                .udev_rules
                .join(format!("80-snappy_{}_{}.rules", m.name, assign.part_id));
            fs::write(&path, content)?;
            debug!("Wrote udev rules {}", path.display());
        }

        self.reload_udev()
    }

    /// Delete every udev rules file written for the OEM package
    pub fn remove_oem_hardware_udev_rules(&self, m: &PackageYaml) -> Result<()> {
        let pattern = self.dirs.udev_rules.join(format!("80-snappy_{}_*.rules", m.name));
        for path in glob::glob(&pattern.to_string_lossy())?.filter_map(|e| e.ok()) {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn reload_udev(&self) -> Result<()> {
        if !self.dirs.is_live_root() {
            debug!("Skipping udev reload for target root");
            return Ok(());
        }
        for args in [&["control", "--reload-rules"][..], &["trigger"][..]] {
            let output = Command::new("udevadm").args(args).output()?;
            if !output.status.success() {
                return Err(Error::ServiceFailed {
                    unit: "udev".to_string(),
                    action: "reload",
                    message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }
        info!("Reloaded udev rules");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const OEM: &str = r#"
name: beagle
version: "1.0"
type: oem
oem:
  hardware:
    assign:
      - part-id: device-hive-iot-hal
        rules:
          - kernel: ttyUSB0
          - subsystem: tty
            with-subsystems: usb-serial
            with-driver: ftdi_sio
            with-attrs: [idVendor=0403, idProduct=6001]
            with-props: [BAUD=9600]
"#;

    #[test]
    fn test_udev_rule_lines() {
        let m = PackageYaml::parse(OEM).unwrap();
        let assign = &m.oem.as_ref().unwrap().hardware.assign[0];
        let content = udev_rules_content(assign).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(
            lines[0],
            r#"KERNEL=="ttyUSB0", TAG:="snappy-assign", ENV{SNAPPY_APP}:="device-hive-iot-hal""#
        );
        assert_eq!(
            lines[1],
            r#"SUBSYSTEM=="tty", SUBSYSTEMS=="usb-serial", DRIVER=="ftdi_sio", ATTRS{idVendor}=="0403", ATTRS{idProduct}=="6001", ENV{BAUD}=="9600", TAG:="snappy-assign", ENV{SNAPPY_APP}:="device-hive-iot-hal""#
        );
    }

    #[test]
    fn test_malformed_attr() {
        let rule = UdevRule {
            with_attrs: vec!["idVendor".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            udev_rule_line("x", &rule),
            Err(Error::ParseError { .. })
        ));
    }

    #[test]
    fn test_install_replaces_old_rules() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Engine::for_root(temp_dir.path());
        fs::create_dir_all(&engine.dirs.udev_rules).unwrap();
        let stale = engine.dirs.udev_rules.join("80-snappy_beagle_old-part.rules");
        fs::write(&stale, "stale").unwrap();
        let other = engine.dirs.udev_rules.join("80-snappy_other_part.rules");
        fs::write(&other, "keep").unwrap();

        let m = PackageYaml::parse(OEM).unwrap();
        engine.install_oem_hardware_udev_rules(&m).unwrap();

        assert!(!stale.exists());
        assert!(other.exists());
        let written = engine
            .dirs
            .udev_rules
            .join("80-snappy_beagle_device-hive-iot-hal.rules");
        assert_eq!(fs::read_to_string(written).unwrap().lines().count(), 2);
    }
}
