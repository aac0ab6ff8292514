//! Pure plan computation: which versions to step through and when a
//! differential archive may be used.

use crate::version::{Branch, VersionInfo};

/// Ordered list of versions to install, ascending.
///
/// No installed version collapses to a single full install of the target, as
/// does any non-release branch (pre-release channels do not support
/// differential chaining). An installed version at or past the target yields
/// an empty plan.
pub fn resolve_plan(current: Option<u32>, target: u32, branch: Branch) -> Vec<u32> {
    let Some(current) = current else {
        return vec![target];
    };
    if !branch.is_release() {
        return vec![target];
    }
    if current >= target {
        return Vec::new();
    }
    (current + 1..=target).collect()
}

/// A differential archive is usable only when it exists, is flagged as a true
/// differential, and its declared source matches the version installed
/// immediately before this step executes. Earlier steps change the installed
/// version, so callers must re-check per step.
pub fn differential_usable(info: &VersionInfo, installed_now: u32) -> bool {
    info.diff_url.is_some() && info.is_differential && info.diff_source == Some(installed_now)
}
