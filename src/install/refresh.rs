// src/install/refresh.rs

//! Refreshing the packages that depend on a framework being installed
//!
//! Services of active dependents are stopped, their security profiles are
//! regenerated if the framework's policy changed, and the services are
//! started again.

use super::SnapPart;
use crate::artifacts::service_unit_name;
use crate::dependents::InstalledPart;
use crate::engine::Engine;
use crate::error::Result;
use crate::interact::Interacter;
use crate::policy::policy_tree_digest;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

struct StoppedUnit {
    unit: String,
    timeout: Duration,
}

impl Engine {
    /// Stop, refresh and restart the active dependents of `part`
    ///
    /// On failure the services stopped here are started again, and any that
    /// were already restarted before the failure are stopped first.
    pub(crate) fn refresh_dependents(
        &self,
        part: &SnapPart,
        old_dir: Option<&Path>,
        inter: &dyn Interacter,
    ) -> Result<()> {
        let deps: Vec<InstalledPart> = self
            .dependents
            .dependents_of(part.name())?
            .into_iter()
            .filter(InstalledPart::is_active)
            .collect();
        if deps.is_empty() {
            return Ok(());
        }

        let mut stopped: Vec<StoppedUnit> = Vec::new();
        for dep in &deps {
            for svc in &dep.descriptor.services {
                let unit = service_unit_name(&dep.descriptor, svc);
                let timeout = self.stop_timeout(svc);
                if let Err(e) = self.services.stop(&unit, timeout) {
                    inter.notify(&format!("unable to stop {}; aborting install: {}", unit, e));
                    self.restart_units(&stopped);
                    return Err(e);
                }
                debug!("Stopped {} for refresh of {}", unit, part.name());
                stopped.push(StoppedUnit { unit, timeout });
            }
        }

        if let Err(e) = self.refresh_dependents_security(part, old_dir, &deps, inter) {
            self.restart_units(&stopped);
            return Err(e);
        }

        for (i, stopped_unit) in stopped.iter().enumerate() {
            if let Err(e) = self.services.start(&stopped_unit.unit) {
                inter.notify(&format!(
                    "unable to restart {}; aborting install: {}",
                    stopped_unit.unit, e
                ));
                self.stop_units(&stopped[..i]);
                self.restart_units(&stopped[i + 1..]);
                return Err(e);
            }
        }

        info!("Refreshed {} dependents of {}", deps.len(), part.name());
        Ok(())
    }

    /// Regenerate the profiles of `deps` unless the framework policy is
    /// unchanged from `old_dir`
    pub(crate) fn refresh_dependents_security(
        &self,
        part: &SnapPart,
        old_dir: Option<&Path>,
        deps: &[InstalledPart],
        inter: &dyn Interacter,
    ) -> Result<()> {
        if let Some(old_dir) = old_dir
            && policy_tree_digest(old_dir)? == policy_tree_digest(&part.base_dir)?
        {
            debug!("Framework policy of {} unchanged", part.name());
            return Ok(());
        }

        for dep in deps.iter().filter(|d| d.is_active()) {
            self.add_security_policy(&dep.descriptor, &dep.base_dir)?;
            inter.notify(&format!("refreshed security policy of {}", dep.name()));
        }
        Ok(())
    }

    fn restart_units(&self, units: &[StoppedUnit]) {
        for stopped in units {
            if let Err(e) = self.services.start(&stopped.unit) {
                warn!("Unable to restart {}: {}", stopped.unit, e);
            }
        }
    }

    fn stop_units(&self, units: &[StoppedUnit]) {
        for stopped in units {
            if let Err(e) = self.services.stop(&stopped.unit, stopped.timeout) {
                warn!("Unable to stop {}: {}", stopped.unit, e);
            }
        }
    }
}
