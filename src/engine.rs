// src/engine.rs

//! The install engine and its collaborators
//!
//! `Engine` owns the filesystem layout, the tunables and one instance of
//! every external collaborator. Its operations are spread over the modules
//! that implement them:
//!
//! - `hooks`: hook iteration and `run_hooks`
//! - `artifacts`: binary wrappers, service units, security profiles
//! - `activate`: `set_active` / `unset_active`
//! - `install`: `install_click` / `remove_click`
//!
//! The engine does no locking; callers must serialize operations against
//! the same root.

use crate::archive::{ArchiveReader, ClickDebReader};
use crate::config::EngineConfig;
use crate::dependents::{DependentResolver, InstalledDependents};
use crate::dirs::Dirs;
use crate::policy::{FrameworkPolicy, FrameworkPolicyDir, SeccompGenerator, SecurityPolicyGenerator};
use crate::services::{ServiceManager, Systemctl};
use std::path::Path;

/// Package install engine bound to one root filesystem
pub struct Engine {
    pub(crate) dirs: Dirs,
    pub(crate) config: EngineConfig,
    pub(crate) services: Box<dyn ServiceManager>,
    pub(crate) security: Box<dyn SecurityPolicyGenerator>,
    pub(crate) framework_policy: Box<dyn FrameworkPolicy>,
    pub(crate) dependents: Box<dyn DependentResolver>,
    pub(crate) archives: Box<dyn ArchiveReader>,
}

impl Engine {
    /// Engine with the stock collaborators for `dirs`
    pub fn new(dirs: Dirs, config: EngineConfig) -> Self {
        Self {
            services: Box::new(Systemctl::new(&dirs)),
            security: Box::new(SeccompGenerator),
            framework_policy: Box::new(FrameworkPolicyDir::new(&dirs)),
            dependents: Box::new(InstalledDependents::new(&dirs)),
            archives: Box::new(ClickDebReader::new(config.verify_command.clone())),
            dirs,
            config,
        }
    }

    /// Engine with default configuration operating below `root`
    pub fn for_root(root: impl AsRef<Path>) -> Self {
        Self::new(Dirs::new(root), EngineConfig::default())
    }

    pub fn with_service_manager(mut self, services: impl ServiceManager + 'static) -> Self {
        self.services = Box::new(services);
        self
    }

    pub fn with_security_generator(
        mut self,
        security: impl SecurityPolicyGenerator + 'static,
    ) -> Self {
        self.security = Box::new(security);
        self
    }

    pub fn with_framework_policy(mut self, policy: impl FrameworkPolicy + 'static) -> Self {
        self.framework_policy = Box::new(policy);
        self
    }

    pub fn with_dependent_resolver(mut self, resolver: impl DependentResolver + 'static) -> Self {
        self.dependents = Box::new(resolver);
        self
    }

    pub fn with_archive_reader(mut self, archives: impl ArchiveReader + 'static) -> Self {
        self.archives = Box::new(archives);
        self
    }

    pub fn dirs(&self) -> &Dirs {
        &self.dirs
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("dirs", &self.dirs)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
