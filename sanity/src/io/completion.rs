//! Loading of the compatibility catalog.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::catalog::CompatibilityCatalog;
use crate::core::types::ContentKind;

/// Load `docker.txt` and `remote.txt` from `dir`, or the built-in tables when `dir` is `None`.
///
/// A missing file in `dir` is an empty table, not an error.
pub fn load_catalog(dir: Option<&Path>, kind: ContentKind) -> Result<CompatibilityCatalog> {
    let Some(dir) = dir else {
        debug!("using built-in completion tables");
        return CompatibilityCatalog::builtin(kind);
    };
    debug!(dir = %dir.display(), "loading completion tables");
    let docker = read_optional(&dir.join("docker.txt"))?;
    let remote = read_optional(&dir.join("remote.txt"))?;
    CompatibilityCatalog::from_completion(&docker, &remote, kind)
        .with_context(|| format!("parse completion tables in {}", dir.display()))
}

fn read_optional(path: &Path) -> Result<String> {
    if !path.exists() {
        return Ok(String::new());
    }
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_overrides_builtin_tables() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("docker.txt"), "custom python=3.11\n").expect("write");
        let catalog = load_catalog(Some(temp.path()), ContentKind::Core).expect("load");
        assert_eq!(catalog.docker("custom"), Some(&["3.11".to_string()][..]));
        assert!(catalog.docker("ubuntu2004").is_none());
        assert_eq!(catalog.remote_names().count(), 0);
    }

    #[test]
    fn parse_errors_name_the_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("remote.txt"), "rhel/9.0 bogus\n").expect("write");
        let err = load_catalog(Some(temp.path()), ContentKind::Core).expect_err("bad");
        assert!(format!("{err:#}").contains("remote.txt:1"), "{err:#}");
    }

    #[test]
    fn builtin_tables_without_dir() {
        let catalog = load_catalog(None, ContentKind::Core).expect("load");
        assert!(catalog.docker_names().any(|name| name == "default"));
    }
}
