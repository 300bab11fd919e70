//! Stable exit codes for sanity CLI commands.

/// Command succeeded; every tested version passed or was skipped.
pub const OK: i32 = 0;
/// Invalid arguments or config, or the importer failed in a way it does not report as diagnostics.
pub const ERROR: i32 = 1;
/// `sanity import` found issues on at least one version.
pub const FAILURE: i32 = 2;
