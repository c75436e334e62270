// src/manifest/descriptor.rs
//! Package descriptor (`meta/package.yaml`) parsing and data structures
//!
//! The descriptor is read fresh from disk by every operation that needs it,
//! so edits made between two calls are always honoured.

use super::PackageType;
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Relative location of the descriptor inside a version directory
pub const DESCRIPTOR_PATH: &str = "meta/package.yaml";

/// `integration: { <app>: { <hook-name>: <source-file> } }`
pub type Integration = BTreeMap<String, BTreeMap<String, String>>;

/// Root structure of package.yaml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageYaml {
    pub name: String,

    #[serde(deserialize_with = "string_or_number")]
    pub version: String,

    #[serde(default)]
    pub vendor: Option<String>,

    #[serde(default, rename = "type")]
    pub package_type: PackageType,

    #[serde(default)]
    pub frameworks: Vec<String>,

    #[serde(default, deserialize_with = "yes_no")]
    pub explicit_license_agreement: bool,

    #[serde(default)]
    pub services: Vec<Service>,

    #[serde(default)]
    pub binaries: Vec<Binary>,

    #[serde(default)]
    pub integration: Integration,

    #[serde(default)]
    pub oem: Option<OemConfig>,
}

/// Security settings shared by services and binaries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SecurityDefinitions {
    #[serde(default)]
    pub security_template: Option<String>,

    #[serde(default)]
    pub security_policy: Option<SecurityPolicyFiles>,

    #[serde(default)]
    pub caps: Vec<String>,
}

/// Package-shipped policy files, relative to the version directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicyFiles {
    #[serde(default)]
    pub apparmor: Option<String>,
    #[serde(default)]
    pub seccomp: Option<String>,
}

/// A long running service declared by the package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Service {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub start: String,

    #[serde(default)]
    pub stop: String,

    #[serde(default)]
    pub poststop: String,

    #[serde(default, deserialize_with = "timeout")]
    pub stop_timeout: Option<Duration>,

    #[serde(default)]
    pub bus_name: Option<String>,

    #[serde(flatten)]
    pub security: SecurityDefinitions,
}

/// A command-line binary exported by the package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Binary {
    pub name: String,

    /// Path relative to the version directory; defaults to `name`
    #[serde(default)]
    pub exec: String,

    #[serde(default)]
    pub description: String,

    #[serde(flatten)]
    pub security: SecurityDefinitions,
}

/// OEM-only section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OemConfig {
    #[serde(default)]
    pub hardware: Hardware,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hardware {
    #[serde(default)]
    pub assign: Vec<HardwareAssign>,
}

/// Devices handed to a given part
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HardwareAssign {
    pub part_id: String,
    #[serde(default)]
    pub rules: Vec<UdevRule>,
}

/// udev match keys for one device rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UdevRule {
    #[serde(default)]
    pub kernel: Option<String>,
    #[serde(default)]
    pub subsystem: Option<String>,
    #[serde(default)]
    pub with_subsystems: Option<String>,
    #[serde(default)]
    pub with_driver: Option<String>,
    #[serde(default)]
    pub with_attrs: Vec<String>,
    #[serde(default)]
    pub with_props: Vec<String>,
}

impl PackageYaml {
    /// Load the descriptor from a file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::parse(path, e))?;
        Self::parse(&content).map_err(|e| match e {
            Error::Yaml(y) => Error::parse(path, y),
            Error::ParseError { message, .. } => Error::parse(path, message),
            other => other,
        })
    }

    /// Load the descriptor of an installed version directory
    pub fn from_version_dir(dir: &Path) -> Result<Self> {
        Self::from_file(&dir.join(DESCRIPTOR_PATH))
    }

    /// Parse the descriptor from YAML
    pub fn parse(content: &str) -> Result<Self> {
        let mut m: PackageYaml = serde_yaml::from_str(content)?;
        m.validate()?;
        for binary in &mut m.binaries {
            if binary.exec.is_empty() {
                binary.exec = binary.name.clone();
            }
        }
        Ok(m)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::parse(DESCRIPTOR_PATH, "missing required field: name"));
        }
        if self.version.is_empty() {
            return Err(Error::parse(DESCRIPTOR_PATH, "missing required field: version"));
        }
        if self.name.contains(['/', '.', '_']) {
            return Err(Error::parse(
                DESCRIPTOR_PATH,
                format!("invalid package name: {:?}", self.name),
            ));
        }
        Ok(())
    }

    /// `name.origin`, or the bare name when there is no origin or the
    /// package type is never origin-qualified
    pub fn qualified_name(&self, origin: &str) -> String {
        if origin.is_empty() || !self.package_type.is_origin_qualified() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, origin)
        }
    }

    /// Fail if two binaries, two services, or a binary and a service end
    /// up with the same generated name
    pub fn check_for_name_clashes(&self) -> Result<()> {
        let mut seen_binaries = HashSet::new();
        let mut seen_services = HashSet::new();
        let mut clashes = Vec::new();

        for binary in &self.binaries {
            let name = binary.base_name().to_string();
            if !seen_binaries.insert(name.clone()) {
                clashes.push(name);
            }
        }
        for service in &self.services {
            if !seen_services.insert(service.name.clone()) {
                clashes.push(service.name.clone());
            } else if seen_binaries.contains(&service.name) {
                clashes.push(service.name.clone());
            }
        }

        if clashes.is_empty() {
            Ok(())
        } else {
            clashes.sort();
            clashes.dedup();
            Err(Error::NameClash(clashes))
        }
    }

    /// Names of declared services followed by binaries, with their security
    /// definitions; this is the set of security profiles the package owns
    pub fn security_subjects(&self) -> impl Iterator<Item = (&str, &SecurityDefinitions)> {
        self.services
            .iter()
            .map(|s| (s.name.as_str(), &s.security))
            .chain(self.binaries.iter().map(|b| (b.name.as_str(), &b.security)))
    }
}

impl Binary {
    /// Last path component of the declared name
    pub fn base_name(&self) -> &str {
        Path::new(&self.name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.name)
    }
}

impl Service {
    /// Declared stop timeout, or the given default
    pub fn stop_timeout_or(&self, default: Duration) -> Duration {
        self.stop_timeout.unwrap_or(default)
    }
}

/// Accept `version: 1.0` as well as `version: "1.0"`
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, got {:?}",
            other
        ))),
    }
}

/// Accept `Y`/`yes`/`true` style flags
fn yes_no<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Bool(b) => Ok(b),
        serde_yaml::Value::String(s) => Ok(matches!(
            s.to_lowercase().as_str(),
            "y" | "yes" | "true"
        )),
        serde_yaml::Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a yes/no flag, got {:?}",
            other
        ))),
    }
}

/// Accept `30` (seconds) or `"30s"`, `"2m"`, `"500ms"`
fn timeout<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::Number(n) => n
            .as_u64()
            .map(|secs| Some(Duration::from_secs(secs)))
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timeout: {}", n))),
        serde_yaml::Value::String(s) => parse_duration(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timeout: {:?}", s))),
        other => Err(serde::de::Error::custom(format!(
            "invalid timeout: {:?}",
            other
        ))),
    }
}

fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits.parse().ok()?;
    match unit {
        "" | "s" => Some(Duration::from_secs(value)),
        "ms" => Some(Duration::from_millis(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        _ => None,
    }
}
