//! Shared deterministic types for the import sanity engine.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Where the code under test executes.
///
/// The controller/target role is passed next to the host rather than stored in it,
/// because the same host can be resolved for either role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HostConfig {
    /// The current machine; no image or platform identity.
    Local,
    /// A container started from a named image.
    Docker { name: String },
    /// A remote instance of a named platform (e.g. `freebsd/13.1`).
    Remote { name: String },
}

impl FromStr for HostConfig {
    type Err = anyhow::Error;

    /// Parse `local`, `docker:<image>` or `remote:<platform>`.
    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if value == "local" {
            return Ok(HostConfig::Local);
        }
        match value.split_once(':') {
            Some(("docker", name)) if !name.is_empty() => Ok(HostConfig::Docker {
                name: name.to_string(),
            }),
            Some(("remote", name)) if !name.is_empty() => Ok(HostConfig::Remote {
                name: name.to_string(),
            }),
            _ => bail!("invalid host {value:?}: expected local, docker:<image> or remote:<platform>"),
        }
    }
}

impl fmt::Display for HostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostConfig::Local => write!(f, "local"),
            HostConfig::Docker { name } => write!(f, "docker:{name}"),
            HostConfig::Remote { name } => write!(f, "remote:{name}"),
        }
    }
}

/// What kind of content tree is being tested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// The ansible-core source tree itself.
    Core,
    /// An installed or checked-out collection.
    #[default]
    Collection,
}

impl ContentKind {
    /// Value of the `context=` setting used by completion entries.
    pub fn completion_context(self) -> &'static str {
        match self {
            ContentKind::Core => "ansible-core",
            ContentKind::Collection => "collection",
        }
    }
}

/// Partition of the checked files by content role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportType {
    /// Module and module_utils code, imported with restricted dependencies.
    Module,
    /// Every other plugin, imported with the controller's dependencies available.
    Plugin,
}

impl ImportType {
    /// Categories in the order they are checked.
    pub const ALL: [ImportType; 2] = [ImportType::Module, ImportType::Plugin];

    pub fn as_str(self) -> &'static str {
        match self {
            ImportType::Module => "module",
            ImportType::Plugin => "plugin",
        }
    }

    /// Plugins run with controller-side dependencies, modules do not.
    pub fn controller(self) -> bool {
        matches!(self, ImportType::Plugin)
    }
}

impl fmt::Display for ImportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single issue reported by the importer.
///
/// Two messages are the same message iff all four fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiagnosticMessage {
    pub path: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.path, self.line, self.column, self.message
        )
    }
}

/// Terminal result of one test on one interpreter version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Outcome {
    Success {
        test: String,
        python_version: String,
    },
    Failure {
        test: String,
        python_version: String,
        messages: Vec<DiagnosticMessage>,
    },
    Skipped {
        test: String,
        python_version: String,
        reason: String,
    },
}

impl Outcome {
    pub fn python_version(&self) -> &str {
        match self {
            Outcome::Success { python_version, .. }
            | Outcome::Failure { python_version, .. }
            | Outcome::Skipped { python_version, .. } => python_version,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. })
    }
}
