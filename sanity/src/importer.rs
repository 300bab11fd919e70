//! The import sanity test for a single interpreter version.
//!
//! For each import type the selected files are fed to `importer.py`, which runs
//! inside a freshly provisioned environment so that only the dependencies that
//! type may rely on are importable.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::aggregate::finalize;
use crate::core::catalog::VersionPolicy;
use crate::core::diagnostics::{
    RunClassification, ToolFailure, classify_run, parse_diagnostics,
};
use crate::core::ignore::MessageProcessor;
use crate::core::selector::{ContentLayout, filter_targets, select};
use crate::core::types::{ImportType, Outcome};
use crate::io::environment::{
    EnvironmentSource, ImporterVariables, importer_environment, prepend_path,
};
use crate::io::process::{CommandOutput, run_command_with_timeout};
use crate::io::sandbox::{Provisioner, SandboxHandle, VirtualenvRequest};
use crate::io::scratch::ScratchDir;

pub const TEST_NAME: &str = "import";

/// Settings shared by every version the test runs on.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub layout: ContentLayout,
    pub policy: VersionPolicy,
    /// Directory containing `importer.py` and `yaml_to_json.py`.
    pub scripts_dir: PathBuf,
    /// Scratch root relative to the content root.
    pub temp_path: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
    pub coverage: bool,
}

impl ImportSettings {
    /// Importer scratch root relative to the content root, with a trailing separator.
    ///
    /// `.` components are dropped so the prefix matches the importer's normalized paths.
    pub fn relative_temp_root(&self) -> String {
        let root: PathBuf = self
            .temp_path
            .components()
            .filter(|component| !matches!(component, Component::CurDir))
            .collect::<PathBuf>()
            .join("sanity")
            .join(TEST_NAME);
        format!("{}{}", root.display(), MAIN_SEPARATOR)
    }

    fn absolute_temp_path(&self) -> PathBuf {
        self.layout.root.join(&self.temp_path)
    }
}

pub struct ImportTest<'a, P, E> {
    settings: &'a ImportSettings,
    provisioner: &'a P,
    environment: &'a E,
}

impl<'a, P: Provisioner, E: EnvironmentSource> ImportTest<'a, P, E> {
    pub fn new(settings: &'a ImportSettings, provisioner: &'a P, environment: &'a E) -> Self {
        Self {
            settings,
            provisioner,
            environment,
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        self.settings
    }

    /// Targets this test checks at all.
    pub fn filter_targets<'t>(&self, paths: &'t [String]) -> Vec<&'t str> {
        filter_targets(paths, &self.settings.layout)
    }

    /// Run the test on `version` against already filtered `targets`.
    ///
    /// Returns `Skipped` when a sandbox cannot be provisioned. Importer failures
    /// that are not diagnostics are returned as errors carrying a
    /// [`ToolFailure`].
    #[instrument(skip_all, fields(test = TEST_NAME, version = %version))]
    pub fn test<M: MessageProcessor + ?Sized>(
        &self,
        version: &str,
        targets: &[&str],
        processor: &M,
    ) -> Result<Outcome> {
        let paths: Vec<&str> = targets
            .iter()
            .copied()
            .filter(|path| !processor.is_skipped(path))
            .collect();
        let relative_temp_root = self.settings.relative_temp_root();
        let mut messages = Vec::new();

        for import_type in ImportType::ALL {
            if import_type == ImportType::Plugin && self.settings.policy.is_remote_only(version) {
                debug!(version, "plugin imports are not checked on remote-only python");
                continue;
            }

            let selected = select(&paths, import_type, &self.settings.layout);
            if selected.is_empty() {
                continue;
            }

            let name = format!("{TEST_NAME}.{import_type}");
            let request = VirtualenvRequest {
                name: &name,
                version,
                controller: import_type.controller(),
            };
            let Some(sandbox) = self.provisioner.create(&request)? else {
                let reason = format!(
                    "Skipping sanity test \"{TEST_NAME}\" ({import_type}) on Python {version} due to missing virtual environment support."
                );
                warn!("{reason}");
                return Ok(Outcome::Skipped {
                    test: TEST_NAME.to_string(),
                    python_version: version.to_string(),
                    reason,
                });
            };

            if self.provisioner.yaml_support(&sandbox) == Some(false) {
                warn!(
                    "Sanity test \"{TEST_NAME}\" ({import_type}) on Python {version} may be slow due to missing libyaml support in PyYAML."
                );
            }

            let output = self.run_importer(import_type, version, &sandbox, &selected)?;
            let stdout = output.stdout_lossy();
            let stderr = output.stderr_lossy();
            match classify_run(output.status.code(), &stdout, &stderr) {
                RunClassification::CleanRun => {
                    debug!(%import_type, "no import issues");
                }
                RunClassification::DiagnosticsCaptured { stdout, .. } => {
                    let parsed = parse_diagnostics(&stdout, &relative_temp_root).with_context(
                        || format!("parse {TEST_NAME} ({import_type}) output on python {version}"),
                    )?;
                    info!(%import_type, count = parsed.len(), "import issues reported");
                    messages.extend(parsed);
                }
                RunClassification::ToolError(failure) => {
                    return Err(anyhow::Error::new(failure).context(format!(
                        "sanity test \"{TEST_NAME}\" ({import_type}) on python {version}"
                    )));
                }
            }
        }

        Ok(finalize(TEST_NAME, version, messages, &paths, processor))
    }

    /// Stage the importer and run it on `selected`. The scratch directory is
    /// removed before this returns, whatever the result.
    fn run_importer(
        &self,
        import_type: ImportType,
        version: &str,
        sandbox: &SandboxHandle,
        selected: &[&str],
    ) -> Result<CommandOutput> {
        let temp_path = self.settings.absolute_temp_path();
        fs::create_dir_all(&temp_path)
            .with_context(|| format!("create {}", temp_path.display()))?;

        let mut env = importer_environment(
            self.environment.base(),
            &ImporterVariables {
                temp_path: &temp_path,
                import_type,
                collection: self.settings.layout.collection.as_ref(),
                external_python: sandbox.external_python(),
            },
        );

        let data = selected.join("\n");
        debug!(%import_type, paths = %data, "importer input");

        let scratch = ScratchDir::stage(&self.settings.scripts_dir)?;
        prepend_path(&mut env, scratch.path())?;

        let mut cmd = self.importer_command(
            sandbox.python(),
            &scratch.importer(),
            import_type,
            version,
            &mut env,
        )?;
        cmd.current_dir(&self.settings.layout.root)
            .env_clear()
            .envs(&env);

        info!(
            %import_type,
            count = selected.len(),
            sandbox = %sandbox.path().display(),
            "running importer"
        );
        let output = run_command_with_timeout(
            cmd,
            Some(data.as_bytes()),
            self.settings.timeout,
            self.settings.output_limit_bytes,
        )
        .context("run importer")?;

        if output.timed_out {
            let failure = ToolFailure {
                status: None,
                stdout: output.stdout_lossy(),
                stderr: output.stderr_lossy(),
            };
            return Err(anyhow::Error::new(failure).context(format!(
                "importer ({import_type}) on python {version} timed out after {}s",
                self.settings.timeout.as_secs()
            )));
        }
        if output.stdout_truncated > 0 || output.stderr_truncated > 0 {
            bail!(
                "importer ({import_type}) on python {version} output exceeded {} bytes \
                 ({} stdout and {} stderr bytes dropped)",
                self.settings.output_limit_bytes,
                output.stdout_truncated,
                output.stderr_truncated
            );
        }
        Ok(output)
    }

    fn importer_command(
        &self,
        python: &Path,
        importer: &Path,
        import_type: ImportType,
        version: &str,
        env: &mut BTreeMap<String, String>,
    ) -> Result<Command> {
        let mut cmd = Command::new(python);
        if self.settings.coverage {
            let coverage_dir = self.settings.absolute_temp_path().join("coverage");
            fs::create_dir_all(&coverage_dir)
                .with_context(|| format!("create {}", coverage_dir.display()))?;
            let coverage_file =
                coverage_dir.join(format!("{TEST_NAME}.{import_type}.python-{version}"));
            env.insert(
                "COVERAGE_FILE".to_string(),
                coverage_file.to_string_lossy().into_owned(),
            );
            cmd.args(["-m", "coverage", "run", "--parallel-mode"]);
        }
        cmd.arg(importer);
        Ok(cmd)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::ignore::{IgnoreSettings, PassThrough};
    use crate::test_support::{FakeProvisioner, FixedEnvironment, ImportFixture};

    #[test]
    fn relative_temp_root_has_trailing_separator() {
        let fixture = ImportFixture::new("exit 0\n").expect("fixture");
        let mut settings = fixture.settings.clone();
        settings.temp_path = PathBuf::from("sandbox/tmp");
        assert_eq!(settings.relative_temp_root(), "sandbox/tmp/sanity/import/");
    }

    #[test]
    fn relative_temp_root_ignores_current_dir_components() {
        let fixture = ImportFixture::new("exit 0\n").expect("fixture");
        let mut settings = fixture.settings.clone();
        settings.temp_path = PathBuf::from("./out/./tmp");
        assert_eq!(settings.relative_temp_root(), "out/tmp/sanity/import/");
    }

    #[test]
    fn truncated_output_is_fatal() {
        let line = "plugins/modules/a.py:1:0: x\n";
        let mut fixture = ImportFixture::new(
            "cat > /dev/null\n\
             echo 'plugins/modules/a.py:1:0: x'\n\
             echo 'plugins/modules/b.py:2:0: y'\n\
             exit 10\n",
        )
        .expect("fixture");
        fixture.settings.output_limit_bytes = line.len();
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);

        let err = test
            .test(
                "3.11",
                &["plugins/modules/a.py", "plugins/modules/b.py"],
                &PassThrough,
            )
            .expect_err("truncated output must not be parsed");
        let text = format!("{err:#}");
        assert!(text.contains("exceeded"), "{text}");
        assert!(text.contains("28 stdout"), "{text}");
    }

    #[test]
    fn timeout_keeps_partial_output() {
        let mut fixture =
            ImportFixture::new("echo partial\nexec sleep 10\n").expect("fixture");
        fixture.settings.timeout = Duration::from_secs(1);
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);

        let err = test
            .test("3.11", &["plugins/modules/a.py"], &PassThrough)
            .expect_err("timeout");
        assert!(format!("{err:#}").contains("timed out after 1s"), "{err:#}");
        let failure = err.downcast_ref::<ToolFailure>().expect("tool failure");
        assert_eq!(failure.status, None);
        assert_eq!(failure.stdout, "partial\n");
    }

    #[test]
    fn coverage_creates_output_dir() {
        let mut fixture = ImportFixture::new("exit 0\n").expect("fixture");
        fixture.settings.coverage = true;
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);

        let mut vars = BTreeMap::new();
        let cmd = test
            .importer_command(
                Path::new("/usr/bin/python3.11"),
                Path::new("importer.py"),
                ImportType::Plugin,
                "3.11",
                &mut vars,
            )
            .expect("command");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, ["-m", "coverage", "run", "--parallel-mode", "importer.py"]);
        let coverage_file = PathBuf::from(&vars["COVERAGE_FILE"]);
        assert_eq!(
            coverage_file,
            fixture.temp_path().join("coverage/import.plugin.python-3.11")
        );
        assert!(coverage_file.parent().expect("parent").is_dir());
    }

    #[test]
    fn clean_importer_run_is_success() {
        let fixture = ImportFixture::new("cat > /dev/null\nexit 0\n").expect("fixture");
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);

        let outcome = test
            .test("3.11", &["plugins/module_utils/foo.py"], &PassThrough)
            .expect("outcome");
        assert_eq!(
            outcome,
            Outcome::Success {
                test: "import".to_string(),
                python_version: "3.11".to_string(),
            }
        );
        assert_eq!(provisioner.requests(), vec!["import.module:3.11:false"]);
    }

    #[test]
    fn diagnostics_become_failure_messages() {
        let fixture = ImportFixture::new(
            "while read -r path || [ -n \"$path\" ]; do echo \"$path:1:0: ImportError: broken\"; done\nexit 10\n",
        )
        .expect("fixture");
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);

        let outcome = test
            .test("3.11", &["plugins/modules/a.py", "plugins/lookup/b.py"], &PassThrough)
            .expect("outcome");
        let Outcome::Failure { messages, .. } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        let paths: Vec<&str> = messages.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["plugins/modules/a.py", "plugins/lookup/b.py"]);
        assert_eq!(
            provisioner.requests(),
            vec!["import.module:3.11:false", "import.plugin:3.11:true"]
        );
    }

    #[test]
    fn remote_only_versions_skip_plugin_category() {
        let fixture = ImportFixture::new("cat > /dev/null\nexit 0\n").expect("fixture");
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);

        test.test("2.7", &["plugins/modules/a.py", "plugins/lookup/b.py"], &PassThrough)
            .expect("outcome");
        assert_eq!(provisioner.requests(), vec!["import.module:2.7:false"]);
    }

    #[test]
    fn missing_libyaml_only_warns() {
        let fixture = ImportFixture::new("cat > /dev/null\nexit 0\n").expect("fixture");
        let provisioner = FakeProvisioner::without_libyaml();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);

        let outcome = test
            .test("3.10", &["plugins/modules/a.py"], &PassThrough)
            .expect("outcome");
        assert!(matches!(outcome, Outcome::Success { .. }));
    }

    #[test]
    fn missing_sandbox_is_skipped_without_running_importer() {
        let fixture = ImportFixture::new("echo ran > \"$SANITY_TEMP_PATH/ran\"\nexit 1\n")
            .expect("fixture");
        let provisioner = FakeProvisioner::unavailable();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);

        let outcome = test
            .test("3.11", &["plugins/modules/a.py"], &PassThrough)
            .expect("skipped is not an error");
        let Outcome::Skipped { reason, .. } = outcome else {
            panic!("expected skipped, got {outcome:?}");
        };
        assert!(reason.contains("missing virtual environment support"), "{reason}");
        assert!(!fixture.temp_path().join("ran").exists());
    }

    #[test]
    fn stderr_output_is_a_tool_error() {
        let fixture = ImportFixture::new("echo 'Traceback (most recent call last):' >&2\nexit 1\n")
            .expect("fixture");
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);

        let err = test
            .test("3.11", &["plugins/modules/a.py"], &PassThrough)
            .expect_err("tool error");
        let failure = err
            .downcast_ref::<ToolFailure>()
            .expect("tool failure");
        assert_eq!(failure.status, Some(1));
        assert!(failure.stderr.contains("Traceback"));
    }

    #[test]
    fn scratch_dir_is_removed_after_tool_error() {
        let fixture = ImportFixture::new(
            "dirname \"$0\" > \"$SANITY_TEMP_PATH/scratch\"\necho boom >&2\nexit 2\n",
        )
        .expect("fixture");
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);

        assert!(test.test("3.11", &["plugins/modules/a.py"], &PassThrough).is_err());
        let scratch = fs::read_to_string(fixture.temp_path().join("scratch")).expect("scratch");
        assert!(!Path::new(scratch.trim()).exists());
    }

    #[test]
    fn importer_sees_sanity_environment() {
        let fixture = ImportFixture::new(
            "cat > /dev/null\n\
             echo \"$SANITY_IMPORTER_TYPE $SANITY_COLLECTION_FULL_NAME $SANITY_EXTERNAL_PYTHON\" > \"$SANITY_TEMP_PATH/env\"\n\
             exit 0\n",
        )
        .expect("fixture");
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);

        test.test("3.11", &["plugins/modules/a.py"], &PassThrough)
            .expect("outcome");
        let seen = fs::read_to_string(fixture.temp_path().join("env")).expect("env");
        assert_eq!(seen.trim(), "module ns.col /bin/sh");
    }

    #[test]
    fn skipped_paths_are_not_checked() {
        let fixture = ImportFixture::new("cat > \"$SANITY_TEMP_PATH/input\"\nexit 0\n")
            .expect("fixture");
        let provisioner = FakeProvisioner::available();
        let env = FixedEnvironment::minimal();
        let test = ImportTest::new(&fixture.settings, &provisioner, &env);
        let ignore = IgnoreSettings::parse(
            "tests/sanity/ignore.txt",
            "plugins/modules/b.py import-3.11!skip\n",
        )
        .expect("ignore");

        test.test(
            "3.11",
            &["plugins/modules/a.py", "plugins/modules/b.py"],
            &ignore.for_test(TEST_NAME, "3.11"),
        )
        .expect("outcome");
        let input = fs::read_to_string(fixture.temp_path().join("input")).expect("input");
        assert_eq!(input, "plugins/modules/a.py");
    }
}
