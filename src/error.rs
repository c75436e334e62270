// src/error.rs

//! Error types for the snapkit engine

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while installing, activating or removing packages
#[derive(Error, Debug)]
pub enum Error {
    #[error("Signature verification failed for {path}: {reason}")]
    VerificationFailed { path: PathBuf, reason: String },

    #[error("Failed to parse {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Illegal content for field {field}: {content:?} (allowed: {whitelist})")]
    WhitelistViolation {
        field: String,
        content: String,
        whitelist: &'static str,
    },

    #[error("Hook command {command:?} failed with exit code {exit_code}")]
    HookFailed { command: String, exit_code: i32 },

    #[error("Hook command {command:?} timed out after {timeout_secs} seconds")]
    HookTimedOut { command: String, timeout_secs: u64 },

    #[error("Failed to unpack {archive} into {dest} (exit code {exit_code:?})")]
    UnpackFailed {
        archive: PathBuf,
        dest: PathBuf,
        exit_code: Option<i32>,
    },

    #[error("Package at {0} is not the active version")]
    NotActive(PathBuf),

    #[error("Failed to copy data from {old_path} to {new_path} (exit code {exit_code})")]
    DataCopyFailed {
        old_path: PathBuf,
        new_path: PathBuf,
        exit_code: i32,
    },

    #[error("Privileged unpack helper not found")]
    PrivilegeHelperNotFound,

    #[error("Name clash for binaries or services: {}", .0.join(", "))]
    NameClash(Vec<String>),

    #[error("Package {0} is an OEM package and OEM installs are not allowed")]
    OemNotAllowed(String),

    #[error("License for package {0} was not accepted")]
    LicenseNotAccepted(String),

    #[error("Missing frameworks: {}", .0.join(", "))]
    MissingFrameworks(Vec<String>),

    #[error("Expected exactly one manifest in {dir}, found {count}")]
    ManifestCount { dir: PathBuf, count: usize },

    #[error("Service {unit} failed to {action}: {message}")]
    ServiceFailed {
        unit: String,
        action: &'static str,
        message: String,
    },

    #[error("Service {unit} did not stop within {timeout_secs} seconds")]
    ServiceTimeout { unit: String, timeout_secs: u64 },

    #[error("Security policy error: {0}")]
    Policy(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl Error {
    /// True for a service stop that ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ServiceTimeout { .. })
    }

    /// Shorthand for a parse failure on a given file
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::ParseError {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
