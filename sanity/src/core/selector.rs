//! Deterministic selection of the files each import category checks.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use crate::core::types::{ContentKind, ImportType};

/// Source file extension the importer understands.
pub const SOURCE_EXTENSION: &str = "py";

/// Fully-qualified identity of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDetail {
    pub namespace: String,
    pub name: String,
}

impl CollectionDetail {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

/// Read-only description of the content tree under test.
///
/// All paths except `root` are relative to `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLayout {
    pub root: std::path::PathBuf,
    pub kind: ContentKind,
    pub module_path: String,
    pub module_utils_path: String,
    /// Plugin type to directory, including modules and module_utils.
    pub plugin_paths: BTreeMap<String, String>,
    pub collection: Option<CollectionDetail>,
}

const PLUGIN_TYPES: &[&str] = &[
    "action",
    "become",
    "cache",
    "callback",
    "cliconf",
    "connection",
    "doc_fragments",
    "filter",
    "httpapi",
    "inventory",
    "lookup",
    "module_utils",
    "modules",
    "netconf",
    "shell",
    "strategy",
    "terminal",
    "test",
    "vars",
];

impl ContentLayout {
    /// Layout of a collection rooted at `root`.
    pub fn collection(root: impl Into<std::path::PathBuf>, namespace: &str, name: &str) -> Self {
        let plugin_paths = PLUGIN_TYPES
            .iter()
            .map(|kind| (kind.to_string(), format!("plugins/{kind}")))
            .collect();
        Self {
            root: root.into(),
            kind: ContentKind::Collection,
            module_path: "plugins/modules".to_string(),
            module_utils_path: "plugins/module_utils".to_string(),
            plugin_paths,
            collection: Some(CollectionDetail {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
        }
    }

    /// Layout of the ansible-core source tree rooted at `root`.
    pub fn core(root: impl Into<std::path::PathBuf>) -> Self {
        let plugin_paths = PLUGIN_TYPES
            .iter()
            .map(|kind| {
                let path = match *kind {
                    "modules" => "lib/ansible/modules".to_string(),
                    "module_utils" => "lib/ansible/module_utils".to_string(),
                    other => format!("lib/ansible/plugins/{other}"),
                };
                (kind.to_string(), path)
            })
            .collect();
        Self {
            root: root.into(),
            kind: ContentKind::Core,
            module_path: "lib/ansible/modules".to_string(),
            module_utils_path: "lib/ansible/module_utils".to_string(),
            plugin_paths,
            collection: None,
        }
    }
}

/// True if `path` is `dir` or lies beneath it, comparing whole components.
pub fn is_subdir(path: &str, dir: &str) -> bool {
    let mut path = normalized(Path::new(path));
    for expected in normalized(Path::new(dir)) {
        match path.next() {
            Some(actual) if actual == expected => {}
            _ => return false,
        }
    }
    true
}

fn normalized(path: &Path) -> impl Iterator<Item = Component<'_>> {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
}

/// Keep `.py` files that live under one of the layout's plugin paths.
pub fn filter_targets<'a>(paths: &'a [String], layout: &ContentLayout) -> Vec<&'a str> {
    paths
        .iter()
        .map(String::as_str)
        .filter(|path| is_eligible(path, layout))
        .collect()
}

fn is_eligible(path: &str, layout: &ContentLayout) -> bool {
    let has_extension = Path::new(path)
        .extension()
        .is_some_and(|ext| ext == SOURCE_EXTENSION);
    has_extension
        && layout
            .plugin_paths
            .values()
            .any(|plugin_path| is_subdir(path, plugin_path))
}

/// True if `path` belongs to `import_type`.
///
/// Module code is anything under the module or module_utils paths; every other
/// path is plugin code, so each path belongs to exactly one category.
pub fn classify(path: &str, import_type: ImportType, layout: &ContentLayout) -> bool {
    let restricted =
        is_subdir(path, &layout.module_path) || is_subdir(path, &layout.module_utils_path);
    match import_type {
        ImportType::Module => restricted,
        ImportType::Plugin => !restricted,
    }
}

/// Paths from `paths` that belong to `import_type`, in input order.
pub fn select<'a>(paths: &[&'a str], import_type: ImportType, layout: &ContentLayout) -> Vec<&'a str> {
    paths
        .iter()
        .copied()
        .filter(|path| classify(path, import_type, layout))
        .collect()
}
