//! Loading of the sanity ignore file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::ignore::IgnoreSettings;

/// Load the ignore file at `relative` under `root`; no file means no entries.
pub fn load_ignore_settings(root: &Path, relative: Option<&Path>) -> Result<IgnoreSettings> {
    let Some(relative) = relative else {
        return Ok(IgnoreSettings::default());
    };
    let path = root.join(relative);
    if !path.exists() {
        return Ok(IgnoreSettings::default());
    }
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    IgnoreSettings::parse(&relative.to_string_lossy(), &contents)
}
