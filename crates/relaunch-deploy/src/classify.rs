//! Pure classification of apply-tool failures from captured output.

use crate::runner::CommandOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The archive itself is damaged; deleting it and re-downloading is the
    /// right recovery.
    CorruptedArchive,
    PermissionDenied,
    DiskFull,
    Other,
}

impl FailureKind {
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::CorruptedArchive => {
                "the downloaded archive is corrupted; it has been discarded, please retry the update"
            }
            FailureKind::PermissionDenied => {
                "the updater does not have permission to write to the install directory"
            }
            FailureKind::DiskFull => "there is not enough free disk space to apply the update",
            FailureKind::Other => "the update could not be applied; see the log for tool output",
        }
    }
}

const CORRUPT_MARKERS: &[&str] = &[
    "corrupt",
    "bad archive",
    "invalid archive",
    "unexpected end of archive",
    "checksum error",
];

const PERMISSION_MARKERS: &[&str] = &["permission denied", "access is denied", "eacces"];

const DISK_MARKERS: &[&str] = &["no space left", "disk full", "not enough space", "enospc"];

/// Decide what went wrong from the tool's combined output. Substring matching
/// is all the tool gives us; the exit status alone distinguishes nothing.
pub fn classify_failure(output: &CommandOutput) -> FailureKind {
    let haystack = format!("{}\n{}", output.stderr, output.stdout).to_lowercase();

    if CORRUPT_MARKERS.iter().any(|m| haystack.contains(m)) {
        FailureKind::CorruptedArchive
    } else if PERMISSION_MARKERS.iter().any(|m| haystack.contains(m)) {
        FailureKind::PermissionDenied
    } else if DISK_MARKERS.iter().any(|m| haystack.contains(m)) {
        FailureKind::DiskFull
    } else {
        FailureKind::Other
    }
}
