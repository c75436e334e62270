// src/artifacts/service.rs

//! systemd units for declared services

use super::{remove_artifact, security_profile_name, write_artifact};
use crate::engine::Engine;
use crate::error::Result;
use crate::interact::Interacter;
use crate::manifest::{PackageType, PackageYaml, Service, origin_from_basedir, verify_whitelist};
use crate::services::ServiceDescription;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, warn};

/// Unit name: `<pkg>_<service>_<version>.service`
pub fn service_unit_name(m: &PackageYaml, service: &Service) -> String {
    format!("{}_{}_{}.service", m.name, service.name, m.version)
}

fn bus_policy_name(m: &PackageYaml, service: &Service) -> String {
    format!("{}_{}_{}.conf", m.name, service.name, m.version)
}

impl Engine {
    /// Stop timeout of a service, falling back to the configured default
    pub(crate) fn stop_timeout(&self, service: &Service) -> std::time::Duration {
        service.stop_timeout_or(self.config.default_stop_timeout())
    }

    fn service_unit_path(&self, m: &PackageYaml, service: &Service) -> PathBuf {
        self.dirs.services.join(service_unit_name(m, service))
    }

    fn bus_policy_path(&self, m: &PackageYaml, service: &Service) -> PathBuf {
        self.dirs.bus_policy.join(bus_policy_name(m, service))
    }

    /// Render the unit text for one service of the package at `base_dir`
    pub(crate) fn render_service_unit(
        &self,
        service: &Service,
        base_dir: &Path,
        m: &PackageYaml,
    ) -> Result<String> {
        verify_whitelist(service)?;

        let real_base_dir = self.dirs.strip_root(base_dir);
        let desc = ServiceDescription {
            app_name: m.name.clone(),
            service_name: service.name.clone(),
            version: m.version.clone(),
            description: service.description.clone(),
            app_path: real_base_dir.to_string_lossy().into_owned(),
            start: service.start.clone(),
            stop: service.stop.clone(),
            poststop: service.poststop.clone(),
            stop_timeout: self.stop_timeout(service),
            security_profile: security_profile_name(m, &service.name, base_dir),
            is_framework: m.package_type == PackageType::Framework,
            bus_name: service.bus_name.clone(),
            udev_app_name: m.qualified_name(&origin_from_basedir(base_dir)),
            launcher: self.config.launcher.clone(),
        };
        Ok(self.services.gen_unit_file(&desc))
    }

    /// Write, enable and (unless inhibited) start every declared service
    ///
    /// Enabling always happens; reload and start are skipped when hooks
    /// are inhibited.
    pub fn add_package_services(
        &self,
        base_dir: &Path,
        inhibit_hooks: bool,
        _inter: &dyn Interacter,
    ) -> Result<()> {
        let m = PackageYaml::from_version_dir(base_dir)?;

        for service in &m.services {
            let content = self.render_service_unit(service, base_dir, &m)?;
            let unit_path = self.service_unit_path(&m, service);
            write_artifact(&unit_path, content.as_bytes(), 0o644)?;
            debug!("Wrote unit {}", unit_path.display());

            if m.package_type == PackageType::Framework
                && let Some(bus_name) = &service.bus_name
            {
                let policy = self.security.generate_bus_policy(bus_name)?;
                write_artifact(&self.bus_policy_path(&m, service), &policy, 0o644)?;
            }

            let unit = service_unit_name(&m, service);
            if !inhibit_hooks {
                self.services.daemon_reload()?;
            }
            self.services.enable(&unit)?;
            if !inhibit_hooks {
                self.services.start(&unit)?;
            }
        }
        Ok(())
    }

    /// Disable, stop and delete every declared service
    ///
    /// A stop that times out is escalated to TERM, then KILL after the
    /// configured grace period; kill failures are ignored.
    pub fn remove_package_services(&self, base_dir: &Path, inter: &dyn Interacter) -> Result<()> {
        let m = PackageYaml::from_version_dir(base_dir)?;

        for service in &m.services {
            let unit = service_unit_name(&m, service);
            self.services.disable(&unit)?;

            if let Err(e) = self.services.stop(&unit, self.stop_timeout(service)) {
                if !e.is_timeout() {
                    return Err(e);
                }
                inter.notify(&format!("{} refused to stop, killing.", unit));
                if let Err(e) = self.services.kill(&unit, "TERM") {
                    debug!("kill -TERM {}: {}", unit, e);
                }
                thread::sleep(self.config.kill_wait());
                if let Err(e) = self.services.kill(&unit, "KILL") {
                    debug!("kill -KILL {}: {}", unit, e);
                }
            }

            if let Err(e) = remove_artifact(&self.service_unit_path(&m, service)) {
                warn!("Failed to remove service file for {}: {}", unit, e);
            }
            if let Err(e) = remove_artifact(&self.bus_policy_path(&m, service)) {
                warn!("Failed to remove bus policy file for {}: {}", unit, e);
            }
        }

        if !m.services.is_empty() {
            self.services.daemon_reload()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::interact::SilentInteracter;
    use crate::services::ServiceManager;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records calls; `stop` can be told to time out
    #[derive(Clone, Default)]
    struct Recorder {
        calls: Rc<RefCell<Vec<String>>>,
        stop_times_out: bool,
    }

    impl Recorder {
        fn push(&self, call: String) -> Result<()> {
            self.calls.borrow_mut().push(call);
            Ok(())
        }
    }

    impl ServiceManager for Recorder {
        fn enable(&self, unit: &str) -> Result<()> {
            self.push(format!("enable {}", unit))
        }
        fn disable(&self, unit: &str) -> Result<()> {
            self.push(format!("disable {}", unit))
        }
        fn start(&self, unit: &str) -> Result<()> {
            self.push(format!("start {}", unit))
        }
        fn stop(&self, unit: &str, timeout: Duration) -> Result<()> {
            self.push(format!("stop {} {}", unit, timeout.as_secs()))?;
            if self.stop_times_out {
                return Err(Error::ServiceTimeout {
                    unit: unit.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            Ok(())
        }
        fn kill(&self, unit: &str, signal: &str) -> Result<()> {
            self.push(format!("kill {} {}", unit, signal))
        }
        fn daemon_reload(&self) -> Result<()> {
            self.push("daemon-reload".to_string())
        }
    }

    const YAML: &str = r#"
name: webdm
version: "1.0"
type: framework
services:
  - name: webdm
    description: Web device manager
    start: bin/webdm
    stop-timeout: 3s
    bus-name: com.example.webdm
"#;

    fn setup(root: &Path, recorder: &Recorder) -> (Engine, PathBuf) {
        let config = crate::config::EngineConfig {
            kill_wait_secs: 0,
            ..Default::default()
        };
        let engine = Engine::new(crate::dirs::Dirs::new(root), config)
            .with_service_manager(recorder.clone());
        let base_dir = engine.dirs.apps.join("webdm/1.0");
        fs::create_dir_all(base_dir.join("meta")).unwrap();
        fs::write(base_dir.join("meta/package.yaml"), YAML).unwrap();
        (engine, base_dir)
    }

    #[test]
    fn test_add_services() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let (engine, base_dir) = setup(temp_dir.path(), &recorder);

        engine
            .add_package_services(&base_dir, false, &SilentInteracter)
            .unwrap();

        let unit = fs::read_to_string(engine.dirs.services.join("webdm_webdm_1.0.service")).unwrap();
        assert!(unit.contains("ExecStart=ubuntu-core-launcher webdm webdm_webdm_1.0 /apps/webdm/1.0/bin/webdm\n"));
        assert!(unit.contains("TimeoutStopSec=3\n"));
        assert!(engine.dirs.bus_policy.join("webdm_webdm_1.0.conf").is_file());
        assert_eq!(
            *recorder.calls.borrow(),
            vec![
                "daemon-reload",
                "enable webdm_webdm_1.0.service",
                "start webdm_webdm_1.0.service"
            ]
        );
    }

    #[test]
    fn test_add_services_inhibited_still_enables() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let (engine, base_dir) = setup(temp_dir.path(), &recorder);

        engine
            .add_package_services(&base_dir, true, &SilentInteracter)
            .unwrap();
        assert_eq!(*recorder.calls.borrow(), vec!["enable webdm_webdm_1.0.service"]);
    }

    #[test]
    fn test_remove_services_escalates_timeout() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder {
            stop_times_out: true,
            ..Default::default()
        };
        let (engine, base_dir) = setup(temp_dir.path(), &recorder);
        engine
            .add_package_services(&base_dir, true, &SilentInteracter)
            .unwrap();
        recorder.calls.borrow_mut().clear();

        engine
            .remove_package_services(&base_dir, &SilentInteracter)
            .unwrap();
        assert_eq!(
            *recorder.calls.borrow(),
            vec![
                "disable webdm_webdm_1.0.service",
                "stop webdm_webdm_1.0.service 3",
                "kill webdm_webdm_1.0.service TERM",
                "kill webdm_webdm_1.0.service KILL",
                "daemon-reload",
            ]
        );
        assert!(!engine.dirs.services.join("webdm_webdm_1.0.service").exists());
        assert!(!engine.dirs.bus_policy.join("webdm_webdm_1.0.conf").exists());

        // already removed files are fine
        engine
            .remove_package_services(&base_dir, &SilentInteracter)
            .unwrap();
    }

    #[test]
    fn test_illegal_service_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let (engine, base_dir) = setup(temp_dir.path(), &recorder);
        fs::write(
            base_dir.join("meta/package.yaml"),
            "name: foo\nversion: \"1\"\nservices:\n  - name: foo\n    start: \"bin/foo && reboot\"\n",
        )
        .unwrap();

        assert!(matches!(
            engine.add_package_services(&base_dir, false, &SilentInteracter),
            Err(Error::WhitelistViolation { .. })
        ));
        assert!(recorder.calls.borrow().is_empty());
    }
}
