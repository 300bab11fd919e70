//! Multi-version import sanity engine.
//!
//! Resolves the Python versions a host supports, then checks that every selected
//! source file imports cleanly on each of them inside an isolated environment.
//!
//! - **[`core`]**: Pure, deterministic logic (version resolution, target
//!   classification, diagnostic parsing, aggregation). No I/O.
//! - **[`io`]**: Side-effecting operations (config and catalog files, process
//!   execution, virtual environments, scratch directories).
//!
//! [`importer`] runs the test for one version; [`run`] drives it across versions.

pub mod core;
pub mod exit_codes;
pub mod importer;
pub mod io;
pub mod logging;
pub mod report;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
