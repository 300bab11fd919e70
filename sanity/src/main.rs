//! Import sanity test runner.
//!
//! Checks that Python source files import cleanly on every interpreter version a
//! host supports. Run from the root of an ansible-core checkout or a collection;
//! settings are read from `sanity.toml` there.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sanity::core::resolver::resolve;
use sanity::core::types::{ContentKind, HostConfig};
use sanity::exit_codes;
use sanity::importer::{ImportSettings, ImportTest};
use sanity::io::completion::load_catalog;
use sanity::io::config::{ContentConfig, SanityConfig, load_config, write_config};
use sanity::io::environment::InheritedEnvironment;
use sanity::io::ignore_file::load_ignore_settings;
use sanity::io::sandbox::VenvProvisioner;
use sanity::report::{self, Results};
use sanity::run::{VersionSelection, run_import};

#[derive(Parser)]
#[command(
    name = "sanity",
    version,
    about = "Multi-version import sanity test runner"
)]
struct Cli {
    /// Config file, relative to the content root.
    #[arg(long, global = true, default_value = "sanity.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,

        /// Collection namespace; omit for an ansible-core checkout.
        #[arg(long, requires = "name")]
        namespace: Option<String>,

        /// Collection name.
        #[arg(long, requires = "namespace")]
        name: Option<String>,
    },
    /// Print the python versions a host supports, one per line.
    Pythons {
        #[command(flatten)]
        host: HostArgs,
    },
    /// Run the import test on each supported python version.
    Import {
        #[command(flatten)]
        host: HostArgs,

        /// Only test these versions (repeatable).
        #[arg(long = "python", value_name = "VERSION")]
        pythons: Vec<String>,

        /// Also write results as JSON to this file.
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,

        /// Files to check, relative to the content root.
        paths: Vec<String>,
    },
    /// List the docker images and remote platforms in the completion tables.
    Completion,
}

#[derive(clap::Args)]
struct HostArgs {
    /// `local`, `docker:<image>` or `remote:<platform>`.
    #[arg(long, default_value = "local")]
    host: HostConfig,

    /// Resolve versions for the controller role.
    #[arg(long)]
    controller: bool,

    /// Unknown images and platforms support no versions.
    #[arg(long)]
    strict: bool,
}

fn main() {
    sanity::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("ERROR: {:#}", err);
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("read current dir")?;
    let config_path = root.join(&cli.config);
    match cli.command {
        Command::Init {
            force,
            namespace,
            name,
        } => cmd_init(&config_path, force, namespace, name),
        Command::Pythons { host } => cmd_pythons(&root, &load_config(&config_path)?, &host),
        Command::Import {
            host,
            pythons,
            json,
            paths,
        } => cmd_import(
            &root,
            &load_config(&config_path)?,
            &host,
            &pythons,
            json.as_deref(),
            &paths,
        ),
        Command::Completion => cmd_completion(&root, &load_config(&config_path)?),
    }
}

fn cmd_init(
    path: &Path,
    force: bool,
    namespace: Option<String>,
    name: Option<String>,
) -> Result<i32> {
    if !force && path.exists() {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let kind = if namespace.is_some() {
        ContentKind::Collection
    } else {
        ContentKind::Core
    };
    let cfg = SanityConfig {
        content: ContentConfig {
            kind,
            namespace,
            name,
        },
        ..SanityConfig::default()
    };
    write_config(path, &cfg)?;
    Ok(exit_codes::OK)
}

fn cmd_pythons(root: &Path, cfg: &SanityConfig, args: &HostArgs) -> Result<i32> {
    let catalog = load_catalog(completion_dir(root, cfg).as_deref(), cfg.content.kind)?;
    let versions = resolve(
        &catalog,
        &cfg.pythons,
        &args.host,
        args.controller,
        args.strict,
    );
    let mut out = std::io::stdout().lock();
    for version in versions {
        writeln!(out, "{version}")?;
    }
    Ok(exit_codes::OK)
}

fn cmd_import(
    root: &Path,
    cfg: &SanityConfig,
    args: &HostArgs,
    pythons: &[String],
    json: Option<&Path>,
    paths: &[String],
) -> Result<i32> {
    let catalog = load_catalog(completion_dir(root, cfg).as_deref(), cfg.content.kind)?;
    let ignore = load_ignore_settings(root, cfg.ignore_file.as_deref())?;
    let settings = ImportSettings {
        layout: cfg.layout(root),
        policy: cfg.pythons.clone(),
        scripts_dir: root.join(&cfg.scripts_root).join("import"),
        temp_path: cfg.temp_path.clone(),
        timeout: Duration::from_secs(cfg.timeout_secs),
        output_limit_bytes: cfg.output_limit_bytes,
        coverage: cfg.coverage,
    };
    let provisioner = VenvProvisioner::new(
        root.join(&cfg.temp_path).join(".venv"),
        Duration::from_secs(cfg.provision_timeout_secs),
        cfg.output_limit_bytes,
    );
    let environment = InheritedEnvironment;
    let test = ImportTest::new(&settings, &provisioner, &environment);

    let outcomes = run_import(
        &catalog,
        &test,
        &VersionSelection {
            host: &args.host,
            controller: args.controller,
            strict: args.strict,
            requested: pythons,
        },
        paths,
        &ignore,
    )?;

    report::write_text(&mut std::io::stdout().lock(), &outcomes)?;
    if let Some(path) = json {
        report::write_json(
            &root.join(path),
            &Results {
                host: &args.host,
                outcomes: &outcomes,
            },
        )?;
    }
    Ok(report::exit_code(&outcomes))
}

fn cmd_completion(root: &Path, cfg: &SanityConfig) -> Result<i32> {
    let catalog = load_catalog(completion_dir(root, cfg).as_deref(), cfg.content.kind)?;
    let mut out = std::io::stdout().lock();
    for name in catalog.docker_names() {
        let versions = catalog.docker(name).unwrap_or_default();
        writeln!(out, "docker:{name} {}", versions.join(","))?;
    }
    for name in catalog.remote_names() {
        let versions = catalog.remote(name).unwrap_or_default();
        writeln!(out, "remote:{name} {}", versions.join(","))?;
    }
    Ok(exit_codes::OK)
}

fn completion_dir(root: &Path, cfg: &SanityConfig) -> Option<PathBuf> {
    cfg.completion_dir.as_ref().map(|dir| root.join(dir))
}
