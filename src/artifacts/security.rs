// src/artifacts/security.rs

//! Seccomp profiles for declared services and binaries

use super::{remove_artifact, security_profile_name, write_artifact};
use crate::engine::Engine;
use crate::error::Result;
use crate::manifest::PackageYaml;
use std::path::Path;
use tracing::debug;

impl Engine {
    /// Generate a profile for every service, then every binary
    ///
    /// Stops at the first failure; profiles already written stay.
    pub fn add_security_policy(&self, m: &PackageYaml, base_dir: &Path) -> Result<()> {
        for (name, defs) in m.security_subjects() {
            let profile = security_profile_name(m, name, base_dir);
            let content = self.security.generate_profile(base_dir, name, defs)?;
            let path = self.dirs.seccomp.join(&profile);
            write_artifact(&path, &content, 0o644)?;
            debug!("Wrote security profile {}", path.display());
        }
        Ok(())
    }

    /// Remove the profile of every service and binary
    pub fn remove_security_policy(&self, m: &PackageYaml, base_dir: &Path) -> Result<()> {
        for (name, _) in m.security_subjects() {
            let profile = security_profile_name(m, name, base_dir);
            remove_artifact(&self.dirs.seccomp.join(profile))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::manifest::SecurityDefinitions;
    use crate::policy::SecurityPolicyGenerator;
    use std::fs;
    use tempfile::TempDir;

    const YAML: &str = r#"
name: foo
version: "1.0"
services:
  - name: svc
    start: bin/svc
binaries:
  - name: bin/foo
    caps: [networking]
"#;

    /// Fails for one app name
    struct FailFor(&'static str);

    impl SecurityPolicyGenerator for FailFor {
        fn generate_profile(
            &self,
            _base_dir: &Path,
            app_name: &str,
            _defs: &SecurityDefinitions,
        ) -> Result<Vec<u8>> {
            if app_name == self.0 {
                return Err(Error::Policy(format!("no policy for {}", app_name)));
            }
            Ok(format!("profile {}\n", app_name).into_bytes())
        }
    }

    #[test]
    fn test_add_and_remove_security_policy() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Engine::for_root(temp_dir.path());
        let m = PackageYaml::parse(YAML).unwrap();
        let base_dir = engine.dirs.apps.join("foo.sideload/1.0");

        engine.add_security_policy(&m, &base_dir).unwrap();
        let svc = engine.dirs.seccomp.join("foo.sideload_svc_1.0");
        let bin = engine.dirs.seccomp.join("foo.sideload_bin-foo_1.0");
        assert!(svc.is_file());
        assert!(fs::read_to_string(&bin).unwrap().contains("@policygroups networking"));

        engine.remove_security_policy(&m, &base_dir).unwrap();
        assert!(!svc.exists());
        assert!(!bin.exists());
        engine.remove_security_policy(&m, &base_dir).unwrap();
    }

    #[test]
    fn test_first_failure_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Engine::for_root(temp_dir.path()).with_security_generator(FailFor("svc"));
        let m = PackageYaml::parse(YAML).unwrap();
        let base_dir = engine.dirs.apps.join("foo/1.0");

        assert!(matches!(
            engine.add_security_policy(&m, &base_dir),
            Err(Error::Policy(_))
        ));
        // services come first, so the binary was never reached
        assert!(!engine.dirs.seccomp.join("foo_bin-foo_1.0").exists());
    }
}
