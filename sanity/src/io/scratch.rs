//! Scratch directory that exposes the importer scripts on `PATH`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tempfile::TempDir;
use tracing::debug;

/// Verification entry point, looked up through `PATH`.
pub const IMPORTER_SCRIPT: &str = "importer.py";
/// Helper invoked by the importer.
pub const YAML_TO_JSON_SCRIPT: &str = "yaml_to_json.py";

/// Staged copy of the importer scripts. Removed when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh `ansible-test*-import` directory and link both scripts from
    /// `scripts_dir` into it.
    pub fn stage(scripts_dir: &Path) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("ansible-test")
            .suffix("-import")
            .tempdir()
            .context("create import scratch dir")?;
        for script in [IMPORTER_SCRIPT, YAML_TO_JSON_SCRIPT] {
            let source = absolute(&scripts_dir.join(script))?;
            if !source.is_file() {
                bail!("missing sanity script {}", source.display());
            }
            let target = dir.path().join(script);
            link(&source, &target)
                .with_context(|| format!("link {} -> {}", target.display(), source.display()))?;
        }
        debug!(dir = %dir.path().display(), "staged importer scripts");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn importer(&self) -> PathBuf {
        self.dir.path().join(IMPORTER_SCRIPT)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("read current dir")?;
    Ok(cwd.join(path))
}

#[cfg(unix)]
fn link(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(not(unix))]
fn link(source: &Path, target: &Path) -> std::io::Result<()> {
    std::fs::hard_link(source, target).or_else(|_| std::fs::copy(source, target).map(|_| ()))
}
