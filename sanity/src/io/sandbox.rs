//! Isolated interpreter environments for importer runs.
//!
//! The [`Provisioner`] trait decouples the import check from how environments are
//! created. Tests use fakes that hand out plain temp directories; the default
//! implementation creates a Python virtual environment with `venv`/`virtualenv`.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::io::process::{find_executable, run_command_with_timeout};

/// One provisioned environment. The directory is removed when the handle drops.
#[derive(Debug)]
pub struct SandboxHandle {
    dir: TempDir,
    python: PathBuf,
    external_python: PathBuf,
}

impl SandboxHandle {
    /// `python` runs inside the environment; `external_python` is the interpreter it was built from.
    pub fn new(dir: TempDir, python: PathBuf, external_python: PathBuf) -> Self {
        Self {
            dir,
            python,
            external_python,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    pub fn external_python(&self) -> &Path {
        &self.external_python
    }
}

/// What to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualenvRequest<'a> {
    /// `<test>.<import type>`, e.g. `import.module`.
    pub name: &'a str,
    pub version: &'a str,
    /// The environment runs controller-side code.
    pub controller: bool,
}

pub trait Provisioner {
    /// Create an environment, or `Ok(None)` when this host has no way to create one.
    fn create(&self, request: &VirtualenvRequest<'_>) -> Result<Option<SandboxHandle>>;

    /// `Some(true)` if PyYAML has libyaml bindings, `Some(false)` if it does not,
    /// `None` if PyYAML is missing or the check could not run.
    fn yaml_support(&self, sandbox: &SandboxHandle) -> Option<bool>;
}

const YAML_CHECK: &str = "import json\n\
try:\n    import yaml\nexcept ImportError:\n    yaml = None\n\
print(json.dumps(dict(yaml=yaml is not None, cloader=bool(getattr(yaml, '__with_libyaml__', False)))))\n";

/// Creates virtual environments from `python<version>` found on `PATH`.
#[derive(Debug, Clone)]
pub struct VenvProvisioner {
    /// Parent directory of created environments.
    pub base_dir: PathBuf,
    /// `PATH` used to locate interpreters.
    pub search_path: Option<OsString>,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl VenvProvisioner {
    pub fn new(base_dir: PathBuf, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            base_dir,
            search_path: std::env::var_os("PATH"),
            timeout,
            output_limit_bytes,
        }
    }

    fn environment_module(version: &str) -> &'static str {
        if version.starts_with("2.") {
            "virtualenv"
        } else {
            "venv"
        }
    }
}

impl Provisioner for VenvProvisioner {
    #[instrument(skip_all, fields(name = request.name, version = request.version, controller = request.controller))]
    fn create(&self, request: &VirtualenvRequest<'_>) -> Result<Option<SandboxHandle>> {
        let interpreter = format!("python{}", request.version);
        let Some(external_python) = find_executable(&interpreter, self.search_path.as_deref())
        else {
            debug!(interpreter = %interpreter, "interpreter not found");
            return Ok(None);
        };

        fs::create_dir_all(&self.base_dir)
            .with_context(|| format!("create {}", self.base_dir.display()))?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-{}-", request.name, request.version))
            .tempdir_in(&self.base_dir)
            .with_context(|| format!("create environment dir in {}", self.base_dir.display()))?;

        let module = Self::environment_module(request.version);
        let mut cmd = Command::new(&external_python);
        cmd.args(["-m", module]).arg(dir.path());
        info!(module, dir = %dir.path().display(), "creating virtual environment");
        let output = run_command_with_timeout(cmd, None, self.timeout, self.output_limit_bytes)?;
        if output.timed_out || !output.status.success() {
            warn!(
                module,
                exit_code = ?output.status.code(),
                timed_out = output.timed_out,
                stderr = %output.stderr_lossy().trim(),
                "virtual environment creation failed"
            );
            return Ok(None);
        }

        let python = environment_python(dir.path());
        if !python.exists() {
            warn!(python = %python.display(), "virtual environment has no interpreter");
            return Ok(None);
        }
        Ok(Some(SandboxHandle::new(dir, python, external_python)))
    }

    fn yaml_support(&self, sandbox: &SandboxHandle) -> Option<bool> {
        let mut cmd = Command::new(sandbox.python());
        cmd.args(["-c", YAML_CHECK]);
        let output = match run_command_with_timeout(cmd, None, self.timeout, self.output_limit_bytes)
        {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                debug!(exit_code = ?output.status.code(), "yaml check failed");
                return None;
            }
            Err(err) => {
                debug!(err = %err, "yaml check did not run");
                return None;
            }
        };
        parse_yaml_check(&output.stdout_lossy())
    }
}

#[cfg(unix)]
fn environment_python(dir: &Path) -> PathBuf {
    dir.join("bin").join("python")
}

#[cfg(not(unix))]
fn environment_python(dir: &Path) -> PathBuf {
    dir.join("Scripts").join("python.exe")
}

#[derive(Debug, Deserialize)]
struct YamlCheck {
    yaml: bool,
    cloader: bool,
}

/// Interpret the JSON printed by the yaml check.
pub fn parse_yaml_check(stdout: &str) -> Option<bool> {
    let check: YamlCheck = serde_json::from_str(stdout.trim()).ok()?;
    check.yaml.then_some(check.cloader)
}
