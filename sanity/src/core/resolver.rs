//! Resolution of the interpreter versions a host configuration supports.

use crate::core::catalog::{CompatibilityCatalog, VersionPolicy};
use crate::core::types::HostConfig;

/// Versions usable on `host` when acting in the given role.
///
/// - `Local` returns the policy's set for the role without consulting the catalog.
/// - `Docker`/`Remote` with a catalog entry return the declared versions that are
///   also in the role's set, in declared order.
/// - `Docker`/`Remote` without an entry return the role's set, or nothing when
///   `strict` is set.
pub fn resolve(
    catalog: &CompatibilityCatalog,
    policy: &VersionPolicy,
    host: &HostConfig,
    controller: bool,
    strict: bool,
) -> Vec<String> {
    match host {
        HostConfig::Local => policy.available(controller).to_vec(),
        HostConfig::Docker { name } => {
            intersect(catalog.docker(name), policy.available(controller), strict)
        }
        HostConfig::Remote { name } => {
            intersect(catalog.remote(name), policy.available(controller), strict)
        }
    }
}

/// Versions supported by a host that launches the tests.
///
/// Such a host only needs to run target-side code, so the full supported set is
/// used as the available set.
pub fn controller_pythons(
    catalog: &CompatibilityCatalog,
    policy: &VersionPolicy,
    host: &HostConfig,
    strict: bool,
) -> Vec<String> {
    resolve(catalog, policy, host, false, strict)
}

fn intersect(declared: Option<&[String]>, available: &[String], strict: bool) -> Vec<String> {
    let Some(declared) = declared else {
        return if strict { Vec::new() } else { available.to_vec() };
    };
    declared
        .iter()
        .filter(|version| available.contains(version))
        .cloned()
        .collect()
}
