// src/interact.rs

//! User interaction during install and remove
//!
//! The engine reports status lines (e.g. a service refusing to stop) and,
//! for packages that demand it, asks for license agreement. Implementations:
//! - `LogInteracter`: status lines go to tracing; license answer is fixed
//! - `SilentInteracter`: drops everything, refuses licenses

use tracing::info;

/// Callback interface for user-facing interaction
pub trait Interacter {
    /// Ask the user to agree to a license; true means accepted
    fn agreed(&self, intro: &str, license: &str) -> bool;

    /// Report a status line
    fn notify(&self, status: &str);
}

/// Interacter that logs status lines
#[derive(Debug, Default, Clone, Copy)]
pub struct LogInteracter {
    accept_licenses: bool,
}

impl LogInteracter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept every license prompt (non-interactive provisioning)
    pub fn accept_licenses(mut self, accept: bool) -> Self {
        self.accept_licenses = accept;
        self
    }
}

impl Interacter for LogInteracter {
    fn agreed(&self, intro: &str, _license: &str) -> bool {
        info!("{} (accepted: {})", intro, self.accept_licenses);
        self.accept_licenses
    }

    fn notify(&self, status: &str) {
        info!("{}", status);
    }
}

/// Interacter that says nothing and agrees to nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentInteracter;

impl Interacter for SilentInteracter {
    fn agreed(&self, _intro: &str, _license: &str) -> bool {
        false
    }

    fn notify(&self, _status: &str) {}
}
