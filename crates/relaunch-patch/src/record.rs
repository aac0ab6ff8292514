//! The patch flag record persisted next to the patched binary.
//!
//! The record asserts what the binary was rewritten for; it is never trusted
//! alone. The patcher corroborates it by scanning the binary for the claimed
//! main domain before honoring it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PatchError;
use crate::strategy::PatchMode;

pub const PATCHER_VERSION: &str = env!("CARGO_PKG_VERSION");

const FLAG_SUFFIX: &str = "patchflag.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRecord {
    pub patched_at:       DateTime<Utc>,
    pub original_domain:  String,
    pub target_domain:    String,
    pub patch_mode:       PatchMode,
    pub main_domain:      String,
    pub subdomain_prefix: Option<String>,
    pub patcher_version:  String,
    pub verified:         bool,
}

pub fn flag_path(binary: &Path) -> PathBuf {
    let mut name = binary.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(FLAG_SUFFIX);
    binary.with_file_name(name)
}

/// Missing record reads as `None`; a present but unparseable record is an
/// error so stale garbage never silently passes for unpatched.
pub fn load(binary: &Path) -> Result<Option<PatchRecord>, PatchError> {
    let path = flag_path(binary);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PatchError::io(&path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| PatchError::Record { path, source })
}

/// Atomic write: temp file in the same directory, then rename.
pub fn save(binary: &Path, record: &PatchRecord) -> Result<(), PatchError> {
    let path = flag_path(binary);
    let json = serde_json::to_vec_pretty(record).map_err(|source| PatchError::Record {
        path: path.clone(),
        source,
    })?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| PatchError::io(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| PatchError::io(&path, e))?;
    Ok(())
}
