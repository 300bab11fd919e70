//! Process environment handed to the importer.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::selector::CollectionDetail;
use crate::core::types::ImportType;

pub const SANITY_TEMP_PATH: &str = "SANITY_TEMP_PATH";
pub const SANITY_IMPORTER_TYPE: &str = "SANITY_IMPORTER_TYPE";
pub const SANITY_COLLECTION_FULL_NAME: &str = "SANITY_COLLECTION_FULL_NAME";
pub const SANITY_EXTERNAL_PYTHON: &str = "SANITY_EXTERNAL_PYTHON";

/// Supplies the variables every child process starts from.
pub trait EnvironmentSource {
    fn base(&self) -> BTreeMap<String, String>;
}

/// The current process environment (non-UTF-8 entries are dropped).
pub struct InheritedEnvironment;

impl EnvironmentSource for InheritedEnvironment {
    fn base(&self) -> BTreeMap<String, String> {
        std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }
}

/// Variables that describe one importer run.
pub struct ImporterVariables<'a> {
    /// Absolute scratch root the importer may write to.
    pub temp_path: &'a Path,
    pub import_type: ImportType,
    pub collection: Option<&'a CollectionDetail>,
    /// Interpreter the sandbox was created from.
    pub external_python: &'a Path,
}

/// Build the importer environment on top of `base`.
pub fn importer_environment(
    mut base: BTreeMap<String, String>,
    vars: &ImporterVariables<'_>,
) -> BTreeMap<String, String> {
    base.insert(
        SANITY_TEMP_PATH.to_string(),
        vars.temp_path.to_string_lossy().into_owned(),
    );
    base.insert(
        SANITY_IMPORTER_TYPE.to_string(),
        vars.import_type.as_str().to_string(),
    );
    if let Some(collection) = vars.collection {
        base.insert(
            SANITY_COLLECTION_FULL_NAME.to_string(),
            collection.full_name(),
        );
        base.insert(
            SANITY_EXTERNAL_PYTHON.to_string(),
            vars.external_python.to_string_lossy().into_owned(),
        );
    }
    base
}

/// Put `dir` first on `PATH`.
pub fn prepend_path(env: &mut BTreeMap<String, String>, dir: &Path) -> Result<()> {
    let mut entries = vec![dir.to_path_buf()];
    if let Some(existing) = env.get("PATH") {
        entries.extend(std::env::split_paths(existing));
    }
    let joined = std::env::join_paths(entries).context("join PATH entries")?;
    env.insert(
        "PATH".to_string(),
        joined.to_string_lossy().into_owned(),
    );
    Ok(())
}
