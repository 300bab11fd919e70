//! User-facing rendering of outcomes.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::{HostConfig, Outcome};
use crate::exit_codes;

/// Write one block per outcome.
pub fn write_text<W: Write>(out: &mut W, outcomes: &[Outcome]) -> Result<()> {
    for outcome in outcomes {
        match outcome {
            Outcome::Success {
                test,
                python_version,
            } => writeln!(out, "Sanity test \"{test}\" on python {python_version} passed.")?,
            Outcome::Skipped { reason, .. } => writeln!(out, "WARNING: {reason}")?,
            Outcome::Failure {
                test,
                python_version,
                messages,
            } => {
                writeln!(
                    out,
                    "ERROR: Found {} {test} issue(s) on python {python_version} which need to be resolved:",
                    messages.len()
                )?;
                for message in messages {
                    writeln!(out, "ERROR: {message}")?;
                }
            }
        }
    }
    Ok(())
}

/// Document written by `--json`.
#[derive(Debug, Serialize)]
pub struct Results<'a> {
    pub host: &'a HostConfig,
    pub outcomes: &'a [Outcome],
}

/// Serialize `value` to pretty-printed JSON with trailing newline.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// `FAILURE` if any version failed, otherwise `OK`. Skipped versions do not fail the run.
pub fn exit_code(outcomes: &[Outcome]) -> i32 {
    if outcomes.iter().any(Outcome::is_failure) {
        exit_codes::FAILURE
    } else {
        exit_codes::OK
    }
}
