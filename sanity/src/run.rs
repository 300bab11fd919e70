//! Runs the import test on every interpreter version a host supports.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::catalog::CompatibilityCatalog;
use crate::core::ignore::IgnoreSettings;
use crate::core::resolver::resolve;
use crate::core::types::{HostConfig, Outcome};
use crate::importer::{ImportTest, TEST_NAME};
use crate::io::environment::EnvironmentSource;
use crate::io::sandbox::Provisioner;

/// Which versions to run on.
#[derive(Debug, Clone)]
pub struct VersionSelection<'a> {
    pub host: &'a HostConfig,
    pub controller: bool,
    pub strict: bool,
    /// Explicit versions; empty means every resolved version.
    pub requested: &'a [String],
}

/// Versions to test, in resolution order.
///
/// Requested versions the host does not support are dropped with a warning.
pub fn select_versions(
    catalog: &CompatibilityCatalog,
    test: &ImportTest<'_, impl Provisioner, impl EnvironmentSource>,
    selection: &VersionSelection<'_>,
) -> Vec<String> {
    let resolved = resolve(
        catalog,
        &test.settings().policy,
        selection.host,
        selection.controller,
        selection.strict,
    );
    if selection.requested.is_empty() {
        return resolved;
    }
    for version in selection.requested {
        if !resolved.contains(version) {
            warn!(
                version = %version,
                host = %selection.host,
                "python version is not supported by host, skipping"
            );
        }
    }
    resolved
        .into_iter()
        .filter(|version| selection.requested.contains(version))
        .collect()
}

/// Run the import test for each selected version against `paths`.
///
/// A fatal error on any version stops the run.
#[instrument(skip_all, fields(host = %selection.host, controller = selection.controller))]
pub fn run_import<P: Provisioner, E: EnvironmentSource>(
    catalog: &CompatibilityCatalog,
    test: &ImportTest<'_, P, E>,
    selection: &VersionSelection<'_>,
    paths: &[String],
    ignore: &IgnoreSettings,
) -> Result<Vec<Outcome>> {
    let versions = select_versions(catalog, test, selection);
    if versions.is_empty() {
        warn!("no python versions to test");
        return Ok(Vec::new());
    }
    let targets = test.filter_targets(paths);
    info!(versions = ?versions, targets = targets.len(), "running {TEST_NAME} test");

    let mut outcomes = Vec::with_capacity(versions.len());
    for version in &versions {
        let processor = ignore.for_test(TEST_NAME, version);
        let outcome = test
            .test(version, &targets, &processor)
            .with_context(|| format!("python {version}"))?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[cfg(all(test, unix))]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::core::diagnostics::ToolFailure;
    use crate::test_support::{FakeProvisioner, FixedEnvironment, ImportFixture};

    fn catalog() -> CompatibilityCatalog {
        let mut docker = BTreeMap::new();
        docker.insert(
            "ubuntu2004".to_string(),
            vec!["3.8".to_string(), "3.9".to_string()],
        );
        CompatibilityCatalog::new(docker, BTreeMap::new())
    }

    fn docker(name: &str) -> HostConfig {
        HostConfig::Docker {
            name: name.to_string(),
        }
    }

    #[test]
    fn requested_versions_narrow_the_resolved_set() {
        let fixture = ImportFixture::new("exit 0\n").expect("fixture");
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);
        let host = docker("ubuntu2004");
        let requested = vec!["3.9".to_string(), "3.11".to_string()];

        let versions = select_versions(
            &catalog(),
            &test,
            &VersionSelection {
                host: &host,
                controller: false,
                strict: true,
                requested: &requested,
            },
        );
        assert_eq!(versions, vec!["3.9"]);
    }

    #[test]
    fn runs_each_resolved_version_in_order() {
        let fixture = ImportFixture::new("cat > /dev/null\nexit 0\n").expect("fixture");
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);
        let host = docker("ubuntu2004");
        let paths = vec![
            "plugins/modules/a.py".to_string(),
            "README.md".to_string(),
        ];

        let outcomes = run_import(
            &catalog(),
            &test,
            &VersionSelection {
                host: &host,
                controller: false,
                strict: false,
                requested: &[],
            },
            &paths,
            &IgnoreSettings::default(),
        )
        .expect("run");
        let versions: Vec<&str> = outcomes.iter().map(Outcome::python_version).collect();
        assert_eq!(versions, vec!["3.8", "3.9"]);
        assert!(outcomes.iter().all(|o| matches!(o, Outcome::Success { .. })));
    }

    #[test]
    fn strict_unknown_host_runs_nothing() {
        let fixture = ImportFixture::new("exit 0\n").expect("fixture");
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);
        let host = docker("nonexistent");

        let outcomes = run_import(
            &catalog(),
            &test,
            &VersionSelection {
                host: &host,
                controller: false,
                strict: true,
                requested: &[],
            },
            &["plugins/modules/a.py".to_string()],
            &IgnoreSettings::default(),
        )
        .expect("run");
        assert!(outcomes.is_empty());
        assert!(provisioner.requests().is_empty());
    }

    #[test]
    fn tool_error_aborts_with_version_context() {
        let fixture = ImportFixture::new("echo crash >&2\nexit 1\n").expect("fixture");
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);
        let host = docker("ubuntu2004");

        let err = run_import(
            &catalog(),
            &test,
            &VersionSelection {
                host: &host,
                controller: false,
                strict: false,
                requested: &[],
            },
            &["plugins/modules/a.py".to_string()],
            &IgnoreSettings::default(),
        )
        .expect_err("fatal");
        assert!(format!("{err:#}").starts_with("python 3.8"), "{err:#}");
        assert!(err.downcast_ref::<ToolFailure>().is_some());
        assert_eq!(provisioner.requests(), vec!["import.module:3.8:false"]);
    }

    #[test]
    fn unnecessary_ignores_fail_the_version() {
        let fixture = ImportFixture::new("cat > /dev/null\nexit 0\n").expect("fixture");
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);
        let host = docker("ubuntu2004");
        let ignore = IgnoreSettings::parse(
            "tests/sanity/ignore-2.15.txt",
            "plugins/modules/a.py import-3.9\n",
        )
        .expect("ignore");

        let outcomes = run_import(
            &catalog(),
            &test,
            &VersionSelection {
                host: &host,
                controller: false,
                strict: false,
                requested: &[],
            },
            &["plugins/modules/a.py".to_string()],
            &ignore,
        )
        .expect("run");
        assert!(matches!(outcomes[0], Outcome::Success { .. }));
        let Outcome::Failure { messages, .. } = &outcomes[1] else {
            panic!("expected failure, got {:?}", outcomes[1]);
        };
        assert_eq!(messages[0].path, "tests/sanity/ignore-2.15.txt");
        assert!(messages[0].message.contains("is unnecessary"), "{}", messages[0].message);
    }
}
