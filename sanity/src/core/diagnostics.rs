//! Classification and parsing of importer output.
//!
//! The importer exits 0 with no output when every file imports cleanly, and
//! exits 10 with one `path:line:column: message` line per issue otherwise.
//! Anything else means the importer itself broke.

use std::fmt;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;

use crate::core::types::DiagnosticMessage;

/// Exit status the importer uses to report diagnostics.
pub const DIAGNOSTICS_STATUS: i32 = 10;

static DIAGNOSTIC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<path>[^:]*):(?P<line>[0-9]+):(?P<column>[0-9]+): (?P<message>.*)$")
        .expect("diagnostic pattern compiles")
});

/// How a finished importer run is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunClassification {
    CleanRun,
    DiagnosticsCaptured { stdout: String, stderr: String },
    ToolError(ToolFailure),
}

/// The importer failed in a way that is not a diagnostic report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    /// Exit code, `None` when terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "importer failed with status {code}")?,
            None => write!(f, "importer terminated by signal")?,
        }
        if !self.stdout.is_empty() {
            write!(f, "\n>>> Standard Output\n{}", self.stdout.trim_end())?;
        }
        if !self.stderr.is_empty() {
            write!(f, "\n>>> Standard Error\n{}", self.stderr.trim_end())?;
        }
        Ok(())
    }
}

impl std::error::Error for ToolFailure {}

/// Classify a completed run from its exit status and captured streams.
///
/// Any output at all means the run was not clean. Output is only treated as
/// diagnostics when the status is [`DIAGNOSTICS_STATUS`], stderr is empty and
/// stdout is not.
pub fn classify_run(status: Option<i32>, stdout: &str, stderr: &str) -> RunClassification {
    if status == Some(0) && stdout.is_empty() && stderr.is_empty() {
        return RunClassification::CleanRun;
    }
    if status == Some(DIAGNOSTICS_STATUS) && stderr.is_empty() && !stdout.is_empty() {
        return RunClassification::DiagnosticsCaptured {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        };
    }
    RunClassification::ToolError(ToolFailure {
        status,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    })
}

/// Parse importer stdout into messages.
///
/// `relative_temp_root` is the importer's scratch root relative to the content
/// root, with a trailing separator. Paths under it are reported relative to it.
pub fn parse_diagnostics(stdout: &str, relative_temp_root: &str) -> Result<Vec<DiagnosticMessage>> {
    stdout
        .lines()
        .enumerate()
        .map(|(index, line)| {
            parse_line(line, relative_temp_root)
                .with_context(|| format!("importer output line {}: {:?}", index + 1, line))
        })
        .collect()
}

fn parse_line(line: &str, relative_temp_root: &str) -> Result<DiagnosticMessage> {
    let captures = DIAGNOSTIC_LINE
        .captures(line)
        .ok_or_else(|| anyhow!("does not match path:line:column: message"))?;
    let line_number = captures["line"]
        .parse::<u32>()
        .context("invalid line number")?;
    let column = captures["column"]
        .parse::<u32>()
        .context("invalid column number")?;
    Ok(DiagnosticMessage {
        path: remap_path(&captures["path"], relative_temp_root),
        line: line_number,
        column,
        message: captures["message"].to_string(),
    })
}

/// Strip the scratch root from `path` if it starts with it.
pub fn remap_path(path: &str, relative_temp_root: &str) -> String {
    match path.strip_prefix(relative_temp_root) {
        Some(rest) if !relative_temp_root.is_empty() => rest.to_string(),
        _ => path.to_string(),
    }
}
