// src/lib.rs

//! Snapkit Package Engine
//!
//! Installs, activates, deactivates and removes versions of click-format
//! application packages on a device.
//!
//! # Architecture
//!
//! - Side-by-side versions: every version unpacks into its own directory,
//!   a relative `current` symlink selects the active one
//! - Generated artifacts: activating a version writes binary wrappers,
//!   systemd units, seccomp profiles and hook symlinks derived from its
//!   descriptor; deactivating removes them
//! - Compensating installs: a failed install undoes its completed steps in
//!   reverse order
//! - Pluggable collaborators: service manager, policy generator, archive
//!   reader and dependent lookup are traits on the `Engine`

pub mod activate;
pub mod archive;
pub mod artifacts;
pub mod config;
pub mod data;
pub mod dependents;
pub mod dirs;
mod engine;
mod error;
pub mod hooks;
pub mod install;
pub mod interact;
pub mod manifest;
pub mod oem;
pub mod policy;
pub mod services;

pub use activate::{current_active_dir, is_active};
pub use archive::{ArchiveHandle, ArchiveReader, ClickDeb, ClickDebReader};
pub use config::{DEFAULT_CONFIG_PATH, EngineConfig};
pub use dependents::{DependentResolver, InstalledDependents, InstalledPart};
pub use dirs::Dirs;
pub use engine::Engine;
pub use error::{Error, Result};
pub use hooks::HookDefinition;
pub use install::{InstallFlags, SnapPart, internal_unpack};
pub use interact::{Interacter, LogInteracter, SilentInteracter};
pub use manifest::{ClickManifest, PackageType, PackageYaml};
pub use policy::{FrameworkPolicy, SecurityPolicyGenerator};
pub use services::{ServiceDescription, ServiceManager, Systemctl};
