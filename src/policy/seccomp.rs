// src/policy/seccomp.rs

//! Default seccomp profile generator

use super::SecurityPolicyGenerator;
use crate::error::{Error, Result};
use crate::manifest::SecurityDefinitions;
use std::fs;
use std::path::Path;

/// Template used when the package does not name one
const DEFAULT_TEMPLATE: &str = "default";

/// Generates seccomp profiles from the descriptor's security definitions
///
/// A package-shipped policy (`security-policy: { seccomp: <file> }`) is used
/// verbatim. Otherwise a profile is composed from `security-template` and
/// `caps` for the filter compiler to expand.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeccompGenerator;

impl SecurityPolicyGenerator for SeccompGenerator {
    fn generate_profile(
        &self,
        base_dir: &Path,
        app_name: &str,
        defs: &SecurityDefinitions,
    ) -> Result<Vec<u8>> {
        if let Some(file) = defs.security_policy.as_ref().and_then(|p| p.seccomp.as_ref()) {
            let path = base_dir.join(file);
            return fs::read(&path).map_err(|e| {
                Error::Policy(format!(
                    "failed to read seccomp policy {} for {}: {}",
                    path.display(),
                    app_name,
                    e
                ))
            });
        }

        let template = defs.security_template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
        let mut out = format!("# seccomp profile for {}\n", app_name);
        if template == "unconfined" {
            out.push_str("@unrestricted\n");
        } else {
            out.push_str(&format!("@template {}\n", template));
            if !defs.caps.is_empty() {
                out.push_str(&format!("@policygroups {}\n", defs.caps.join(" ")));
            }
        }
        Ok(out.into_bytes())
    }
}
