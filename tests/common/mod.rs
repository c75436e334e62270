// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use snapkit::{
    ArchiveHandle, ArchiveReader, DependentResolver, Dirs, Engine, EngineConfig, FrameworkPolicy,
    InstalledPart, Interacter, Result, ServiceManager,
};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use walkdir::WalkDir;

/// Service manager recording every call, optionally failing some of them
#[derive(Debug, Clone, Default)]
pub struct RecordingServices {
    pub events: Arc<Mutex<Vec<String>>>,
    pub fail_start: Arc<Mutex<Option<String>>>,
    pub fail_stop: Arc<Mutex<Option<String>>>,
}

impl RecordingServices {
    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn fails(slot: &Mutex<Option<String>>, unit: &str) -> bool {
        slot.lock().unwrap().as_deref() == Some(unit)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl ServiceManager for RecordingServices {
    fn enable(&self, unit: &str) -> Result<()> {
        self.record(format!("enable {}", unit));
        Ok(())
    }

    fn disable(&self, unit: &str) -> Result<()> {
        self.record(format!("disable {}", unit));
        Ok(())
    }

    fn start(&self, unit: &str) -> Result<()> {
        self.record(format!("start {}", unit));
        if Self::fails(&self.fail_start, unit) {
            return Err(snapkit::Error::ServiceFailed {
                unit: unit.to_string(),
                action: "start",
                message: "refused".to_string(),
            });
        }
        Ok(())
    }

    fn stop(&self, unit: &str, _timeout: Duration) -> Result<()> {
        self.record(format!("stop {}", unit));
        if Self::fails(&self.fail_stop, unit) {
            return Err(snapkit::Error::ServiceFailed {
                unit: unit.to_string(),
                action: "stop",
                message: "refused".to_string(),
            });
        }
        Ok(())
    }

    fn kill(&self, unit: &str, signal: &str) -> Result<()> {
        self.record(format!("kill {} {}", unit, signal));
        Ok(())
    }

    fn daemon_reload(&self) -> Result<()> {
        self.record("daemon-reload".to_string());
        Ok(())
    }
}

/// Framework policy that only records what it was asked to do
#[derive(Debug, Clone, Default)]
pub struct RecordingPolicy {
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingPolicy {
    fn record(&self, action: &str, framework: &str, base_dir: &Path) {
        let version = base_dir.file_name().unwrap().to_string_lossy();
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {} {}", action, framework, version));
    }
}

impl FrameworkPolicy for RecordingPolicy {
    fn install(&self, framework: &str, base_dir: &Path) -> Result<()> {
        self.record("install", framework, base_dir);
        Ok(())
    }

    fn remove(&self, framework: &str, base_dir: &Path) -> Result<()> {
        self.record("remove", framework, base_dir);
        Ok(())
    }
}

/// Resolver reporting no dependents for any framework
#[derive(Debug, Clone, Default)]
pub struct NoDependents {
    pub queried: Arc<Mutex<Vec<String>>>,
}

impl DependentResolver for NoDependents {
    fn dependents_of(&self, name: &str) -> Result<Vec<InstalledPart>> {
        self.queried.lock().unwrap().push(name.to_string());
        Ok(Vec::new())
    }
}

/// Interacter collecting notifications and answering license prompts
#[derive(Debug, Default)]
pub struct RecordingInteracter {
    pub accept: bool,
    pub notices: Mutex<Vec<String>>,
}

impl Interacter for RecordingInteracter {
    fn agreed(&self, _intro: &str, _license: &str) -> bool {
        self.accept
    }

    fn notify(&self, status: &str) {
        self.notices.lock().unwrap().push(status.to_string());
    }
}

/// Archive reader over unpacked trees: `<path>/control/*` and `<path>/data/**`
#[derive(Debug, Clone, Default)]
pub struct DirArchiveReader {
    pub opened: Arc<Mutex<Vec<PathBuf>>>,
}

#[derive(Debug)]
struct DirArchive {
    path: PathBuf,
}

impl ArchiveReader for DirArchiveReader {
    fn open(&self, path: &Path, _allow_unauthenticated: bool) -> Result<Box<dyn ArchiveHandle>> {
        if !path.is_dir() {
            return Err(snapkit::Error::VerificationFailed {
                path: path.to_path_buf(),
                reason: "not an unpacked package".to_string(),
            });
        }
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(Box::new(DirArchive {
            path: path.to_path_buf(),
        }))
    }
}

impl ArchiveHandle for DirArchive {
    fn path(&self) -> &Path {
        &self.path
    }

    fn control_member(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path.join("control").join(name))?)
    }

    fn meta_member(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path.join("data/meta").join(name))?)
    }

    fn extract_hashes(&self, dest: &Path) -> Result<()> {
        fs::create_dir_all(dest)?;
        let hashes = self.path.join("control/hashes.yaml");
        if hashes.is_file() {
            fs::copy(hashes, dest.join("hashes.yaml"))?;
        }
        Ok(())
    }

    fn unpack_into(&self, dest: &Path) -> Result<()> {
        let src = self.path.join("data");
        for entry in WalkDir::new(&src) {
            let entry = entry.map_err(|e| snapkit::Error::InvalidPath(e.to_string()))?;
            let target = dest.join(entry.path().strip_prefix(&src).unwrap());
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                fs::copy(entry.path(), &target)?;
            }
        }
        Ok(())
    }
}

/// Lay out an unpacked package for `DirArchiveReader`
pub fn unpacked_package(dir: &Path, name: &str, version: &str) -> PathBuf {
    let path = dir.join(format!("{}_{}", name, version));
    fs::create_dir_all(path.join("control")).unwrap();
    fs::create_dir_all(path.join("data/meta")).unwrap();
    fs::create_dir_all(path.join("data/bin")).unwrap();
    fs::write(
        path.join("control/manifest"),
        format!(r#"{{"name": "{}", "version": "{}"}}"#, name, version),
    )
    .unwrap();
    fs::write(path.join("control/hashes.yaml"), "archive-sha512: 00\n").unwrap();
    fs::write(
        path.join("data/meta/package.yaml"),
        format!(
            "name: {}\nversion: \"{}\"\nbinaries:\n  - name: bin/{}\n",
            name, version, name
        ),
    )
    .unwrap();
    fs::write(path.join("data/bin").join(name), "#!/bin/sh\n").unwrap();
    path
}

/// An engine on a fresh root with recording services.
///
/// Returns (TempDir, Engine, RecordingServices) - keep the TempDir alive.
pub fn setup_engine() -> (TempDir, Engine, RecordingServices) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    fs::create_dir_all(&root).unwrap();

    let services = RecordingServices::default();
    let config = EngineConfig {
        drop_privileges: false,
        kill_wait_secs: 0,
        hook_timeout_secs: 5,
        ..Default::default()
    };
    let engine = Engine::new(Dirs::new(&root), config).with_service_manager(services.clone());
    (temp_dir, engine, services)
}

fn tar_gz(files: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(if path.starts_with("./bin/") { 0o755 } else { 0o644 });
        header.set_cksum();
        builder.append_data(&mut header, path, data.as_slice()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Builder for click archives used as install input
#[derive(Debug, Clone)]
pub struct SnapBuilder {
    name: String,
    version: String,
    package_type: &'static str,
    yaml_extra: String,
    files: Vec<(String, Vec<u8>)>,
}

impl SnapBuilder {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            package_type: "app",
            yaml_extra: String::new(),
            files: Vec::new(),
        }
    }

    pub fn framework(mut self) -> Self {
        self.package_type = "framework";
        self
    }

    /// Append raw lines to the descriptor
    pub fn yaml(mut self, extra: &str) -> Self {
        self.yaml_extra.push_str(extra);
        self
    }

    pub fn file(mut self, path: &str, content: &[u8]) -> Self {
        self.files.push((format!("./{}", path), content.to_vec()));
        self
    }

    /// Write the archive into `dir` and return its path
    pub fn build(&self, dir: &Path) -> PathBuf {
        let yaml = format!(
            "name: {}\nversion: \"{}\"\nvendor: Someone <someone@example.com>\ntype: {}\n{}",
            self.name, self.version, self.package_type, self.yaml_extra
        );
        let manifest = format!(
            r#"{{"name": "{}", "version": "{}", "type": "{}"}}"#,
            self.name, self.version, self.package_type
        );

        let mut data = vec![("./meta/package.yaml".to_string(), yaml.into_bytes())];
        data.extend(self.files.iter().cloned());
        let control = vec![
            ("./manifest".to_string(), manifest.into_bytes()),
            ("./hashes.yaml".to_string(), b"archive-sha512: 00\n".to_vec()),
        ];

        let path = dir.join(format!("{}_{}_all.snap", self.name, self.version));
        let mut builder = ar::Builder::new(File::create(&path).unwrap());
        let members = [
            ("debian-binary", b"2.0\n".to_vec()),
            ("_click-binary", b"0.4\n".to_vec()),
            ("control.tar.gz", tar_gz(&control)),
            ("data.tar.gz", tar_gz(&data)),
        ];
        for (id, content) in &members {
            let header = ar::Header::new(id.as_bytes().to_vec(), content.len() as u64);
            builder.append(&header, content.as_slice()).unwrap();
        }
        path
    }
}

/// Everything below `root`: file contents, symlink targets and directories
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
    let mut tree = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.unwrap();
        let rel = entry.path().strip_prefix(root).unwrap().to_path_buf();
        let file_type = entry.file_type();
        let value = if file_type.is_symlink() {
            format!("-> {}", fs::read_link(entry.path()).unwrap().display())
        } else if file_type.is_dir() {
            "<dir>".to_string()
        } else {
            String::from_utf8_lossy(&fs::read(entry.path()).unwrap()).into_owned()
        };
        tree.insert(rel, value);
    }
    tree
}
