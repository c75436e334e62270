// src/install/part.rs

//! A package archive opened for installation

use crate::activate::current_active_dir;
use crate::archive::ArchiveHandle;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::interact::Interacter;
use crate::manifest::{PackageType, PackageYaml};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const LICENSE_FILE: &str = "license.txt";

/// An opened archive together with its descriptor and install location
pub struct SnapPart {
    pub descriptor: PackageYaml,
    pub origin: String,
    /// `<apps>/<qualified-name>/<version>`
    pub base_dir: PathBuf,
    archive: Box<dyn ArchiveHandle>,
}

impl SnapPart {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn version(&self) -> &str {
        &self.descriptor.version
    }

    pub fn package_type(&self) -> PackageType {
        self.descriptor.package_type
    }

    pub fn qualified_name(&self) -> String {
        self.descriptor.qualified_name(&self.origin)
    }

    pub fn archive(&self) -> &dyn ArchiveHandle {
        self.archive.as_ref()
    }
}

impl std::fmt::Debug for SnapPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapPart")
            .field("name", &self.descriptor.name)
            .field("version", &self.descriptor.version)
            .field("origin", &self.origin)
            .field("base_dir", &self.base_dir)
            .field("archive", &self.archive.path())
            .finish()
    }
}

impl Engine {
    /// Open the archive at `path` and read its descriptor
    pub fn open_snap(&self, path: &Path, origin: &str, allow_unauthenticated: bool) -> Result<SnapPart> {
        let archive = self.archives.open(path, allow_unauthenticated)?;
        let yaml = archive.meta_member("package.yaml")?;
        let descriptor = PackageYaml::parse(&String::from_utf8_lossy(&yaml)).map_err(|e| match e {
            Error::Yaml(y) => Error::parse(path, y),
            other => other,
        })?;

        let base_dir = self
            .dirs
            .package_dir(&descriptor.qualified_name(origin))
            .join(&descriptor.version);
        debug!("{} installs into {}", path.display(), base_dir.display());

        Ok(SnapPart {
            descriptor,
            origin: origin.to_string(),
            base_dir,
            archive,
        })
    }

    /// Refuse packages that must not be installed as they are
    ///
    /// - OEM packages need `allow_oem`
    /// - an explicit license must be agreed to, unless the active version
    ///   already shipped the same one
    /// - every framework the package uses must be active
    /// - binaries and services must not clash
    pub fn can_install(&self, part: &SnapPart, allow_oem: bool, inter: &dyn Interacter) -> Result<()> {
        if part.package_type() == PackageType::Oem && !allow_oem {
            return Err(Error::OemNotAllowed(part.name().to_string()));
        }

        if part.descriptor.explicit_license_agreement {
            let license = part
                .archive()
                .meta_member(LICENSE_FILE)
                .map(|l| String::from_utf8_lossy(&l).into_owned())
                .unwrap_or_default();
            if license.trim().is_empty() {
                return Err(Error::LicenseNotAccepted(part.name().to_string()));
            }
            if !self.license_already_agreed(part, &license) {
                let intro = format!(
                    "{} requires that you accept the following license before continuing",
                    part.name()
                );
                if !inter.agreed(&intro, &license) {
                    return Err(Error::LicenseNotAccepted(part.name().to_string()));
                }
            }
        }

        let missing: Vec<String> = part
            .descriptor
            .frameworks
            .iter()
            .filter(|fw| current_active_dir(&self.dirs.package_dir(fw)).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingFrameworks(missing));
        }

        part.descriptor.check_for_name_clashes()
    }

    fn license_already_agreed(&self, part: &SnapPart, license: &str) -> bool {
        let Some(parent) = part.base_dir.parent() else {
            return false;
        };
        let Some(active) = current_active_dir(parent) else {
            return false;
        };
        let Ok(old) = PackageYaml::from_version_dir(&active) else {
            return false;
        };
        old.explicit_license_agreement
            && fs::read_to_string(active.join("meta").join(LICENSE_FILE)).is_ok_and(|l| l == license)
    }
}
