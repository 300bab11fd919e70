//! Sanity configuration stored in `sanity.toml` at the content root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::catalog::VersionPolicy;
use crate::core::selector::ContentLayout;
use crate::core::types::ContentKind;

/// Sanity configuration (TOML).
///
/// Missing fields fall back to defaults, so an absent or empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SanityConfig {
    /// Scratch root handed to the importer, relative to the content root.
    pub temp_path: PathBuf,

    /// Directory holding `import/importer.py` and `import/yaml_to_json.py`.
    pub scripts_root: PathBuf,

    /// Directory with `docker.txt` and `remote.txt`; the built-in tables are used when unset.
    pub completion_dir: Option<PathBuf>,

    /// Ignore file, relative to the content root.
    pub ignore_file: Option<PathBuf>,

    /// Wall-clock budget for one importer run, in seconds.
    pub timeout_secs: u64,

    /// Wall-clock budget for creating one virtual environment, in seconds.
    pub provision_timeout_secs: u64,

    /// Truncate importer stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Run the importer through `coverage run`.
    pub coverage: bool,

    pub pythons: VersionPolicy,

    pub content: ContentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContentConfig {
    pub kind: ContentKind,
    /// Collection namespace; required when `kind = "collection"`.
    pub namespace: Option<String>,
    /// Collection name; required when `kind = "collection"`.
    pub name: Option<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            kind: ContentKind::Collection,
            namespace: None,
            name: None,
        }
    }
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            temp_path: PathBuf::from("tests/output/.tmp"),
            scripts_root: PathBuf::from("test/lib/ansible_test/_util/target/sanity"),
            completion_dir: None,
            ignore_file: None,
            timeout_secs: 10 * 60,
            provision_timeout_secs: 5 * 60,
            output_limit_bytes: 1_000_000,
            coverage: false,
            pythons: VersionPolicy::default(),
            content: ContentConfig::default(),
        }
    }
}

impl SanityConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        if self.provision_timeout_secs == 0 {
            return Err(anyhow!("provision_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.temp_path.as_os_str().is_empty() {
            return Err(anyhow!("temp_path must not be empty"));
        }
        if self.temp_path.is_absolute() {
            return Err(anyhow!("temp_path must be relative to the content root"));
        }
        self.pythons.validate()?;
        if self.content.kind == ContentKind::Collection
            && (self.content.namespace.is_none() || self.content.name.is_none())
        {
            return Err(anyhow!(
                "content.namespace and content.name are required for collections"
            ));
        }
        Ok(())
    }

    /// Content layout for the tree rooted at `root`.
    pub fn layout(&self, root: &Path) -> ContentLayout {
        match (&self.content.kind, &self.content.namespace, &self.content.name) {
            (ContentKind::Collection, Some(namespace), Some(name)) => {
                ContentLayout::collection(root, namespace, name)
            }
            _ => ContentLayout::core(root),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns the defaults with `content.kind = "core"`, since a
/// collection cannot be described without its namespace and name.
pub fn load_config(path: &Path) -> Result<SanityConfig> {
    if !path.exists() {
        let cfg = SanityConfig {
            content: ContentConfig {
                kind: ContentKind::Core,
                ..ContentConfig::default()
            },
            ..SanityConfig::default()
        };
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SanityConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SanityConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
