//! Ignore and skip entries for sanity test results.
//!
//! An ignore file has one entry per line:
//!
//! ```text
//! plugins/modules/legacy.py import-2.7        # messages for this path are ignored
//! plugins/modules/broken.py import-3.11!skip  # this path is not tested at all
//! plugins/lookup/old.py import                # applies to every version
//! ```

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, bail};

use crate::core::types::DiagnosticMessage;

/// Post-processing applied to the messages of one test run.
pub trait MessageProcessor {
    /// True if `path` must not be tested.
    fn is_skipped(&self, _path: &str) -> bool {
        false
    }

    /// Filter or annotate `messages`; `checked_paths` are the paths that were tested.
    fn process(
        &self,
        messages: Vec<DiagnosticMessage>,
        checked_paths: &[&str],
    ) -> Vec<DiagnosticMessage>;
}

/// Keeps every message.
pub struct PassThrough;

impl MessageProcessor for PassThrough {
    fn process(
        &self,
        messages: Vec<DiagnosticMessage>,
        _checked_paths: &[&str],
    ) -> Vec<DiagnosticMessage> {
        messages
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreEntry {
    pub path: String,
    pub test: String,
    pub version: Option<String>,
    pub skip: bool,
    /// 1-based line in the ignore file.
    pub line: u32,
    /// The test token as written, without `!skip`.
    pub label: String,
}

/// Parsed ignore file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSettings {
    /// Path of the ignore file, relative to the content root.
    pub source: String,
    pub entries: Vec<IgnoreEntry>,
}

impl IgnoreSettings {
    pub fn parse(source: &str, contents: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (index, raw) in contents.lines().enumerate() {
            let line_number = u32::try_from(index + 1).unwrap_or(u32::MAX);
            let line = match raw.split_once('#') {
                Some((before, _)) => before.trim(),
                None => raw.trim(),
            };
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let &[path, token] = fields.as_slice() else {
                bail!("{source}:{line_number}: expected \"<path> <test>\", found {line:?}");
            };
            let (label, skip) = match token.strip_suffix("!skip") {
                Some(label) => (label, true),
                None => (token, false),
            };
            if label.contains('!') {
                bail!("{source}:{line_number}: unsupported ignore flag in {token:?}");
            }
            let (test, version) = split_test_version(label);
            if test.is_empty() {
                bail!("{source}:{line_number}: missing test name");
            }
            entries.push(IgnoreEntry {
                path: path.to_string(),
                test: test.to_string(),
                version: version.map(str::to_string),
                skip,
                line: line_number,
                label: label.to_string(),
            });
        }
        Ok(Self {
            source: source.to_string(),
            entries,
        })
    }

    /// Entries that apply to `test` on `version`.
    pub fn for_test(&self, test: &str, version: &str) -> IgnoreProcessor {
        let mut processor = IgnoreProcessor {
            source: self.source.clone(),
            ignores: BTreeMap::new(),
            skips: BTreeSet::new(),
        };
        for entry in &self.entries {
            let applies =
                entry.test == test && entry.version.as_deref().is_none_or(|v| v == version);
            if !applies {
                continue;
            }
            if entry.skip {
                processor.skips.insert(entry.path.clone());
            } else {
                processor
                    .ignores
                    .entry(entry.path.clone())
                    .or_insert_with(|| (entry.line, entry.label.clone()));
            }
        }
        processor
    }
}

/// `import-3.11` splits into `("import", Some("3.11"))`.
fn split_test_version(label: &str) -> (&str, Option<&str>) {
    match label.rsplit_once('-') {
        Some((test, version))
            if !version.is_empty()
                && version.chars().all(|c| c.is_ascii_digit() || c == '.') =>
        {
            (test, Some(version))
        }
        _ => (label, None),
    }
}

/// Ignore entries bound to one test and version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreProcessor {
    source: String,
    /// Path to (line, label) of the entry that ignores it.
    ignores: BTreeMap<String, (u32, String)>,
    skips: BTreeSet<String>,
}

impl MessageProcessor for IgnoreProcessor {
    fn is_skipped(&self, path: &str) -> bool {
        self.skips.contains(path)
    }

    fn process(
        &self,
        messages: Vec<DiagnosticMessage>,
        checked_paths: &[&str],
    ) -> Vec<DiagnosticMessage> {
        let mut used = BTreeSet::new();
        let mut kept: Vec<DiagnosticMessage> = messages
            .into_iter()
            .filter(|message| {
                if self.ignores.contains_key(&message.path) {
                    used.insert(message.path.clone());
                    false
                } else {
                    true
                }
            })
            .collect();

        for (path, (line, label)) in &self.ignores {
            if used.contains(path) || !checked_paths.contains(&path.as_str()) {
                continue;
            }
            kept.push(DiagnosticMessage {
                path: self.source.clone(),
                line: *line,
                column: 1,
                message: format!("Ignoring '{label}' on '{path}' is unnecessary"),
            });
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IGNORE: &str = "\
# sanity ignores
plugins/modules/legacy.py import-2.7
plugins/modules/broken.py import-3.11!skip  # cannot import on 3.11
plugins/lookup/old.py import
plugins/modules/other.py pylint:blacklisted-name
";

    fn message(path: &str) -> DiagnosticMessage {
        DiagnosticMessage {
            path: path.to_string(),
            line: 1,
            column: 0,
            message: "ImportError".to_string(),
        }
    }

    #[test]
    fn parses_entries_with_versions_and_skips() {
        let settings = IgnoreSettings::parse("tests/sanity/ignore.txt", IGNORE).expect("parse");
        assert_eq!(settings.entries.len(), 4);
        assert_eq!(settings.entries[0].version.as_deref(), Some("2.7"));
        assert!(settings.entries[1].skip);
        assert_eq!(settings.entries[1].line, 3);
        assert_eq!(settings.entries[2].version, None);
        assert_eq!(settings.entries[3].test, "pylint:blacklisted-name");
    }

    #[test]
    fn rejects_malformed_lines() {
        let err = IgnoreSettings::parse("ignore.txt", "only-a-path\n").expect_err("malformed");
        assert!(err.to_string().contains("ignore.txt:1"), "{err}");
        assert!(IgnoreSettings::parse("ignore.txt", "a.py import!fixme\n").is_err());
    }

    #[test]
    fn skips_apply_only_to_matching_version() {
        let settings = IgnoreSettings::parse("ignore.txt", IGNORE).expect("parse");
        assert!(settings.for_test("import", "3.11").is_skipped("plugins/modules/broken.py"));
        assert!(!settings.for_test("import", "3.10").is_skipped("plugins/modules/broken.py"));
    }

    #[test]
    fn drops_messages_on_ignored_paths() {
        let settings = IgnoreSettings::parse("ignore.txt", IGNORE).expect("parse");
        let processor = settings.for_test("import", "2.7");
        let kept = processor.process(
            vec![
                message("plugins/modules/legacy.py"),
                message("plugins/lookup/old.py"),
                message("plugins/modules/new.py"),
            ],
            &[
                "plugins/modules/legacy.py",
                "plugins/lookup/old.py",
                "plugins/modules/new.py",
            ],
        );
        assert_eq!(kept, vec![message("plugins/modules/new.py")]);
    }

    #[test]
    fn reports_unnecessary_ignores_for_checked_paths() {
        let settings = IgnoreSettings::parse("tests/sanity/ignore.txt", IGNORE).expect("parse");
        let processor = settings.for_test("import", "2.7");
        let kept = processor.process(Vec::new(), &["plugins/modules/legacy.py"]);
        assert_eq!(
            kept,
            vec![DiagnosticMessage {
                path: "tests/sanity/ignore.txt".to_string(),
                line: 2,
                column: 1,
                message: "Ignoring 'import-2.7' on 'plugins/modules/legacy.py' is unnecessary"
                    .to_string(),
            }]
        );
    }

    #[test]
    fn unchecked_paths_do_not_report_unnecessary_ignores() {
        let settings = IgnoreSettings::parse("ignore.txt", IGNORE).expect("parse");
        let kept = settings.for_test("import", "2.7").process(Vec::new(), &[]);
        assert!(kept.is_empty());
    }

    #[test]
    fn pass_through_keeps_everything() {
        let kept = PassThrough.process(vec![message("a.py")], &[]);
        assert_eq!(kept, vec![message("a.py")]);
    }
}
