// src/policy/mod.rs

//! Security policy collaborators
//!
//! - `SecurityPolicyGenerator` produces the seccomp profile for one binary or
//!   service, and the D-Bus policy that lets a framework service own its
//!   bus name
//! - `FrameworkPolicy` registers the policy groups and templates a framework
//!   ships for its dependents to use

mod framework;
mod seccomp;

pub use framework::{FRAMEWORK_POLICY_DIR, FrameworkPolicyDir, policy_tree_digest};
pub use seccomp::SeccompGenerator;

use crate::error::Result;
use crate::manifest::SecurityDefinitions;
use std::path::Path;

/// Renders security profile content
pub trait SecurityPolicyGenerator {
    /// Profile content for `app_name` of the package installed at `base_dir`
    fn generate_profile(
        &self,
        base_dir: &Path,
        app_name: &str,
        defs: &SecurityDefinitions,
    ) -> Result<Vec<u8>>;

    /// D-Bus system policy allowing a service to own `bus_name`
    fn generate_bus_policy(&self, bus_name: &str) -> Result<Vec<u8>> {
        Ok(render_bus_policy(bus_name).into_bytes())
    }
}

/// Registers framework-provided policy with the system
pub trait FrameworkPolicy {
    fn install(&self, framework: &str, base_dir: &Path) -> Result<()>;

    fn remove(&self, framework: &str, base_dir: &Path) -> Result<()>;
}

/// Standard busconfig granting ownership of a bus name to root
pub fn render_bus_policy(bus_name: &str) -> String {
    format!(
        r#"<!DOCTYPE busconfig PUBLIC "-//freedesktop//DTD D-BUS Bus Configuration 1.0//EN"
 "http://www.freedesktop.org/standards/dbus/1.0/busconfig.dtd">
<busconfig>
  <policy user="root">
    <allow own="{bus_name}"/>
    <allow send_destination="{bus_name}"/>
  </policy>
  <policy context="default">
    <allow send_destination="{bus_name}"/>
  </policy>
</busconfig>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_bus_policy() {
        let policy = render_bus_policy("com.example.foo");
        assert!(policy.contains(r#"<allow own="com.example.foo"/>"#));
        assert_eq!(policy.matches("send_destination=\"com.example.foo\"").count(), 2);
    }
}
