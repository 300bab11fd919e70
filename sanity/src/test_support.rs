//! Test-only fakes for running the import test without Python.
//!
//! The fake provisioner hands out sandboxes whose interpreter is `/bin/sh`, so a
//! shell script staged as `importer.py` plays the role of the importer.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::catalog::VersionPolicy;
use crate::core::selector::ContentLayout;
use crate::importer::ImportSettings;
use crate::io::environment::EnvironmentSource;
use crate::io::sandbox::{Provisioner, SandboxHandle, VirtualenvRequest};
use crate::io::scratch::{IMPORTER_SCRIPT, YAML_TO_JSON_SCRIPT};

pub const FAKE_PYTHON: &str = "/bin/sh";

/// Provisioner that records requests and optionally refuses to provision.
pub struct FakeProvisioner {
    available: bool,
    yaml: Option<bool>,
    requests: RefCell<Vec<String>>,
}

impl FakeProvisioner {
    pub fn available() -> Self {
        Self {
            available: true,
            yaml: Some(true),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    pub fn without_libyaml() -> Self {
        Self {
            yaml: Some(false),
            ..Self::available()
        }
    }

    /// Requests seen so far as `name:version:controller`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl Provisioner for FakeProvisioner {
    fn create(&self, request: &VirtualenvRequest<'_>) -> Result<Option<SandboxHandle>> {
        self.requests.borrow_mut().push(format!(
            "{}:{}:{}",
            request.name, request.version, request.controller
        ));
        if !self.available {
            return Ok(None);
        }
        let dir = tempfile::tempdir().context("fake sandbox dir")?;
        Ok(Some(SandboxHandle::new(
            dir,
            PathBuf::from(FAKE_PYTHON),
            PathBuf::from(FAKE_PYTHON),
        )))
    }

    fn yaml_support(&self, _sandbox: &SandboxHandle) -> Option<bool> {
        self.yaml
    }
}

/// Environment with a fixed set of variables.
pub struct FixedEnvironment(pub BTreeMap<String, String>);

impl FixedEnvironment {
    /// Just enough `PATH` for shell scripts to find coreutils.
    pub fn minimal() -> Self {
        let mut vars = BTreeMap::new();
        vars.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        Self(vars)
    }
}

impl EnvironmentSource for FixedEnvironment {
    fn base(&self) -> BTreeMap<String, String> {
        self.0.clone()
    }
}

/// A collection content root with a scripted importer.
pub struct ImportFixture {
    pub root: TempDir,
    pub settings: ImportSettings,
}

impl ImportFixture {
    /// Collection `ns.col` whose `importer.py` is the shell script `importer`.
    pub fn new(importer: &str) -> Result<Self> {
        let root = tempfile::tempdir().context("fixture root")?;
        let scripts_dir = root.path().join("scripts").join("import");
        write_scripts(&scripts_dir, importer)?;
        let settings = ImportSettings {
            layout: ContentLayout::collection(root.path(), "ns", "col"),
            policy: VersionPolicy::default(),
            scripts_dir,
            temp_path: PathBuf::from("tests/output/.tmp"),
            timeout: Duration::from_secs(30),
            output_limit_bytes: 100_000,
            coverage: false,
        };
        Ok(Self { root, settings })
    }

    /// Absolute scratch root handed to the importer.
    pub fn temp_path(&self) -> PathBuf {
        self.root.path().join(&self.settings.temp_path)
    }
}

/// Write `importer.py` with the given body and an empty `yaml_to_json.py` into `dir`.
pub fn write_scripts(dir: &Path, importer: &str) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    fs::write(dir.join(IMPORTER_SCRIPT), importer).context("write importer")?;
    fs::write(dir.join(YAML_TO_JSON_SCRIPT), "").context("write yaml_to_json")?;
    Ok(())
}

