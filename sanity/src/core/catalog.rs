//! Interpreter compatibility data for container images and remote platforms.
//!
//! Entries use the completion file format: one entry per line, a name followed
//! by `key=value` settings, e.g.
//!
//! ```text
//! ubuntu2004 image=quay.io/ansible/ubuntu2004-test-container:4.8.0 python=3.8
//! freebsd/13.1 python=3.8,3.7,3.9,3.10 python_dir=/usr/local/bin
//! ```

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::core::types::ContentKind;

const BUILTIN_DOCKER: &str = include_str!("../../completion/docker.txt");
const BUILTIN_REMOTE: &str = include_str!("../../completion/remote.txt");

/// Default interpreter version sets, independent of any host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionPolicy {
    /// Every version the target side may run.
    pub supported: Vec<String>,
    /// Versions the controller itself may run.
    pub controller: Vec<String>,
    /// Target-only versions on which plugin imports are not checked.
    pub remote_only: Vec<String>,
}

impl Default for VersionPolicy {
    fn default() -> Self {
        let versions =
            |list: &[&str]| -> Vec<String> { list.iter().map(|v| v.to_string()).collect() };
        Self {
            supported: versions(&["2.7", "3.5", "3.6", "3.7", "3.8", "3.9", "3.10", "3.11"]),
            controller: versions(&["3.9", "3.10", "3.11"]),
            remote_only: versions(&["2.7", "3.5", "3.6", "3.7", "3.8"]),
        }
    }
}

impl VersionPolicy {
    /// The set a host of the given role may run.
    pub fn available(&self, controller: bool) -> &[String] {
        if controller {
            &self.controller
        } else {
            &self.supported
        }
    }

    pub fn is_remote_only(&self, version: &str) -> bool {
        self.remote_only.iter().any(|v| v == version)
    }

    pub fn validate(&self) -> Result<()> {
        if self.supported.is_empty() {
            bail!("pythons.supported must not be empty");
        }
        for version in self.controller.iter().chain(&self.remote_only) {
            if !self.supported.contains(version) {
                bail!("python {version} is not listed in pythons.supported");
            }
        }
        Ok(())
    }
}

/// One parsed completion line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEntry {
    pub name: String,
    /// Declared interpreter versions, in preference order.
    pub pythons: Vec<String>,
    /// Optional `context=` restriction.
    pub context: Option<String>,
    /// All remaining settings, verbatim.
    pub settings: BTreeMap<String, String>,
}

/// Parse a completion file. `source` is only used in error messages.
pub fn parse_completion(source: &str, contents: &str) -> Result<Vec<CompletionEntry>> {
    let mut entries = Vec::new();
    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else {
            continue;
        };
        let mut entry = CompletionEntry {
            name: name.to_string(),
            pythons: Vec::new(),
            context: None,
            settings: BTreeMap::new(),
        };
        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                bail!("{}:{}: expected key=value, found {:?}", source, index + 1, part);
            };
            match key {
                "python" => {
                    entry.pythons = value
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "context" => entry.context = Some(value.to_string()),
                _ => {
                    entry.settings.insert(key.to_string(), value.to_string());
                }
            }
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Keep entries with no context or a context matching `kind`, keyed by name.
///
/// When a name appears more than once after filtering, the first entry wins.
pub fn filter_completion(
    entries: Vec<CompletionEntry>,
    kind: ContentKind,
) -> BTreeMap<String, Vec<String>> {
    let context = kind.completion_context();
    let mut table = BTreeMap::new();
    for entry in entries {
        if entry.context.as_deref().is_some_and(|c| c != context) {
            continue;
        }
        table.entry(entry.name).or_insert(entry.pythons);
    }
    table
}

/// Read-only lookup of declared interpreter versions per image and platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompatibilityCatalog {
    docker: BTreeMap<String, Vec<String>>,
    remote: BTreeMap<String, Vec<String>>,
}

impl CompatibilityCatalog {
    pub fn new(
        docker: BTreeMap<String, Vec<String>>,
        remote: BTreeMap<String, Vec<String>>,
    ) -> Self {
        Self { docker, remote }
    }

    /// Build a catalog from the contents of `docker.txt` and `remote.txt`.
    pub fn from_completion(docker: &str, remote: &str, kind: ContentKind) -> Result<Self> {
        Ok(Self {
            docker: filter_completion(parse_completion("docker.txt", docker)?, kind),
            remote: filter_completion(parse_completion("remote.txt", remote)?, kind),
        })
    }

    /// Catalog compiled into the binary.
    pub fn builtin(kind: ContentKind) -> Result<Self> {
        Self::from_completion(BUILTIN_DOCKER, BUILTIN_REMOTE, kind)
    }

    pub fn docker(&self, name: &str) -> Option<&[String]> {
        self.docker.get(name).map(Vec::as_slice)
    }

    pub fn remote(&self, name: &str) -> Option<&[String]> {
        self.remote.get(name).map(Vec::as_slice)
    }

    pub fn docker_names(&self) -> impl Iterator<Item = &str> {
        self.docker.keys().map(String::as_str)
    }

    pub fn remote_names(&self) -> impl Iterator<Item = &str> {
        self.remote.keys().map(String::as_str)
    }
}
