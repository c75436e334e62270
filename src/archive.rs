// src/archive.rs

//! Package archive access
//!
//! A click package is an `ar` archive with four members:
//!
//! - `debian-binary` and `_click-binary`: format version markers
//! - `control.tar.gz`: the click `manifest`, `hashes.yaml` and friends
//! - `data.tar.gz`: the package payload, including `meta/package.yaml`
//!
//! The engine only talks to archives through `ArchiveReader` and
//! `ArchiveHandle`; `ClickDebReader` is the on-disk implementation.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tar::Archive;
use tracing::{debug, info};

const CONTROL_MEMBER: &str = "control.tar.gz";
const DATA_MEMBER: &str = "data.tar.gz";
const HASHES_FILE: &str = "hashes.yaml";

/// Opens package archives
pub trait ArchiveReader {
    /// Open `path`, verifying its signature unless `allow_unauthenticated`
    fn open(&self, path: &Path, allow_unauthenticated: bool) -> Result<Box<dyn ArchiveHandle>>;
}

/// An opened package archive; dropping the handle closes it
pub trait ArchiveHandle {
    /// Location of the archive on disk
    fn path(&self) -> &Path;

    /// Read a file from the control part (e.g. `manifest`)
    fn control_member(&self, name: &str) -> Result<Vec<u8>>;

    /// Read a file from the payload's `meta/` directory (e.g. `package.yaml`)
    fn meta_member(&self, name: &str) -> Result<Vec<u8>>;

    /// Write the content hashes shipped in the control part into `dest`
    fn extract_hashes(&self, dest: &Path) -> Result<()>;

    /// Extract the payload into `dest`
    fn unpack_into(&self, dest: &Path) -> Result<()>;
}

/// `ArchiveReader` for click `.snap` / `.click` files
#[derive(Debug, Clone)]
pub struct ClickDebReader {
    verify_command: String,
}

impl ClickDebReader {
    pub fn new(verify_command: impl Into<String>) -> Self {
        Self {
            verify_command: verify_command.into(),
        }
    }

    /// Run `<verify_command> <archive>`; anything but a zero exit fails
    pub fn verify(&self, path: &Path) -> Result<()> {
        debug!("Verifying {} with {}", path.display(), self.verify_command);
        let status = Command::new(&self.verify_command)
            .arg(path)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| Error::VerificationFailed {
                path: path.to_path_buf(),
                reason: format!("failed to run {}: {}", self.verify_command, e),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::VerificationFailed {
                path: path.to_path_buf(),
                reason: format!("{} exited with {}", self.verify_command, status),
            })
        }
    }
}

impl ArchiveReader for ClickDebReader {
    fn open(&self, path: &Path, allow_unauthenticated: bool) -> Result<Box<dyn ArchiveHandle>> {
        if allow_unauthenticated {
            info!("Skipping signature check for {}", path.display());
        } else {
            self.verify(path)?;
        }
        Ok(Box::new(ClickDeb::open(path)?))
    }
}

/// A click archive on disk
#[derive(Debug, Clone)]
pub struct ClickDeb {
    path: PathBuf,
}

impl ClickDeb {
    /// Open an archive without verifying it
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::parse(path, "no such package archive"));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Raw content of a top-level `ar` member
    fn ar_member(&self, member: &str) -> Result<Vec<u8>> {
        let file = File::open(&self.path)?;
        let mut archive = ar::Archive::new(file);

        while let Some(entry) = archive.next_entry() {
            let mut entry = entry.map_err(|e| Error::parse(&self.path, e))?;
            let name = String::from_utf8_lossy(entry.header().identifier()).to_string();
            if name.trim_end_matches('/') == member {
                let mut content = Vec::new();
                entry.read_to_end(&mut content)?;
                return Ok(content);
            }
        }

        Err(Error::parse(&self.path, format!("missing member {}", member)))
    }

    fn tarball(&self, member: &str) -> Result<Archive<GzDecoder<Cursor<Vec<u8>>>>> {
        let content = self.ar_member(member)?;
        Ok(Archive::new(GzDecoder::new(Cursor::new(content))))
    }

    /// Read `wanted` (relative, without leading `./`) from a tarball member
    fn tar_file(&self, member: &str, wanted: &str) -> Result<Vec<u8>> {
        let mut archive = self.tarball(member)?;
        for entry in archive.entries()? {
            let mut entry = entry?;
            let entry_path = entry.path()?.to_string_lossy().into_owned();
            if entry_path.strip_prefix("./").unwrap_or(&entry_path) == wanted {
                let mut content = Vec::new();
                entry.read_to_end(&mut content)?;
                return Ok(content);
            }
        }

        Err(Error::parse(
            &self.path,
            format!("{} has no {}", member, wanted),
        ))
    }
}

impl ArchiveHandle for ClickDeb {
    fn path(&self) -> &Path {
        &self.path
    }

    fn control_member(&self, name: &str) -> Result<Vec<u8>> {
        self.tar_file(CONTROL_MEMBER, name)
    }

    fn meta_member(&self, name: &str) -> Result<Vec<u8>> {
        self.tar_file(DATA_MEMBER, &format!("meta/{}", name))
    }

    fn extract_hashes(&self, dest: &Path) -> Result<()> {
        fs::create_dir_all(dest)?;
        let mut archive = self.tarball(CONTROL_MEMBER)?;

        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let entry_path = entry.path()?.into_owned();
            let Some(file_name) = entry_path.file_name().map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };
            if file_name != HASHES_FILE && !file_name.ends_with(".hash") {
                continue;
            }

            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            fs::write(dest.join(&file_name), content)?;
            debug!("Extracted {} into {}", file_name, dest.display());
        }
        Ok(())
    }

    fn unpack_into(&self, dest: &Path) -> Result<()> {
        fs::create_dir_all(dest)?;
        let mut archive = self.tarball(DATA_MEMBER)?;
        archive.set_preserve_permissions(true);
        archive.unpack(dest).map_err(|e| {
            debug!("Unpacking {} failed: {}", self.path.display(), e);
            Error::UnpackFailed {
                archive: self.path.clone(),
                dest: dest.to_path_buf(),
                exit_code: None,
            }
        })?;
        info!("Unpacked {} into {}", self.path.display(), dest.display());
        Ok(())
    }
}
