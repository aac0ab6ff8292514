//! Version and branch model. Client builds are plain monotonically increasing
//! ordinals; the branch decides availability and whether differential
//! chaining is allowed at all.

use serde::{Deserialize, Serialize};

use relaunch_verify::Sha256Hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Branch {
    Release,
    PreRelease,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Release => "release",
            Branch::PreRelease => "pre-release",
        }
    }

    pub fn is_release(&self) -> bool { matches!(self, Branch::Release) }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about one build: where its archives live and whether a
/// differential archive can replace the full one.
#[derive(Debug, Clone)]
pub struct VersionInfo {
    pub version:         u32,
    pub full_url:        String,
    pub diff_url:        Option<String>,
    /// The installed version the differential archive transforms from. A
    /// differential is only usable when this equals the version on disk at
    /// the moment the step runs.
    pub diff_source:     Option<u32>,
    pub is_differential: bool,
    pub checksum:        Option<Sha256Hash>,
}

/// Builds archive URLs following `{base}/{os}/{arch}/{branch}/{flag}/{version}`
/// and the `{os}-{arch}` platform key of the version-info endpoint.
#[derive(Debug, Clone)]
pub struct ArchiveEndpoint {
    base: String,
    os:   String,
    arch: String,
}

impl ArchiveEndpoint {
    pub fn new(
        base: impl Into<String>,
        os: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            base: base.into(),
            os:   os.into(),
            arch: arch.into(),
        }
    }

    pub fn current_platform(base: impl Into<String>) -> Self {
        Self::new(base, std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn platform_key(&self) -> String { format!("{}-{}", self.os, self.arch) }

    /// `diff_flag` is `0` for a full archive, `1` for a differential one.
    pub fn archive_url(&self, branch: Branch, differential: bool, version: u32) -> String {
        let flag = if differential { 1 } else { 0 };
        format!(
            "{}/{}/{}/{}/{}/{}",
            self.base.trim_end_matches('/'),
            self.os,
            self.arch,
            branch.as_str(),
            flag,
            version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_wire_names() {
        assert_eq!(Branch::Release.as_str(), "release");
        assert_eq!(Branch::PreRelease.as_str(), "pre-release");
        assert_eq!(
            serde_json::to_string(&Branch::PreRelease).unwrap(),
            "\"pre-release\""
        );
    }

    #[test]
    fn archive_url_pattern() {
        let endpoint = ArchiveEndpoint::new("https://cdn.example.net/builds/", "windows", "x86_64");
        assert_eq!(
            endpoint.archive_url(Branch::Release, false, 8),
            "https://cdn.example.net/builds/windows/x86_64/release/0/8"
        );
        assert_eq!(
            endpoint.archive_url(Branch::Release, true, 8),
            "https://cdn.example.net/builds/windows/x86_64/release/1/8"
        );
    }

    #[test]
    fn platform_key_format() {
        let endpoint = ArchiveEndpoint::new("https://cdn", "linux", "aarch64");
        assert_eq!(endpoint.platform_key(), "linux-aarch64");
    }
}
