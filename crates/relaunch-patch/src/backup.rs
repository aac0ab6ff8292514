//! Backup discipline for the client binary.
//!
//! One byte-for-byte copy of the untouched binary lives at `<binary>.original`
//! and survives re-patches. A size difference between binary and backup means
//! the binary was replaced externally (a game update); the stale backup is
//! archived with a timestamp suffix and a fresh one is taken, so patching
//! never proceeds against a backup known to be stale.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use crate::error::PatchError;

pub fn backup_path(binary: &Path) -> PathBuf {
    let mut name = binary.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".original");
    binary.with_file_name(name)
}

/// Make sure a trustworthy backup exists for `binary`, archiving a stale one
/// first when sizes disagree. Returns the backup path.
pub fn ensure_backup(binary: &Path) -> Result<PathBuf, PatchError> {
    let backup = backup_path(binary);

    match std::fs::metadata(&backup) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            std::fs::copy(binary, &backup).map_err(|e| PatchError::io(&backup, e))?;
            info!(backup = %backup.display(), "created pristine backup");
        }
        Err(e) => return Err(PatchError::io(&backup, e)),
        Ok(backup_meta) => {
            let binary_meta =
                std::fs::metadata(binary).map_err(|e| PatchError::io(binary, e))?;
            if binary_meta.len() != backup_meta.len() {
                let archived = archive_path(&backup);
                warn!(
                    backup = %backup.display(),
                    archived = %archived.display(),
                    "binary size changed since backup was taken; archiving stale backup"
                );
                std::fs::rename(&backup, &archived).map_err(|e| PatchError::io(&archived, e))?;
                std::fs::copy(binary, &backup).map_err(|e| PatchError::io(&backup, e))?;
            }
        }
    }

    Ok(backup)
}

/// Copy the backup over the binary, dropping any patched state.
pub fn restore(binary: &Path) -> Result<(), PatchError> {
    let backup = backup_path(binary);
    if !backup.exists() {
        return Err(PatchError::BackupMissing { path: backup });
    }
    std::fs::copy(&backup, binary).map_err(|e| PatchError::io(binary, e))?;
    info!(binary = %binary.display(), "restored binary from backup");
    Ok(())
}

fn archive_path(backup: &Path) -> PathBuf {
    let mut name = backup.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}", Utc::now().format("%Y-%m-%dT%H-%M-%S")));
    backup.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_backup_copies_binary() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("Client.exe");
        std::fs::write(&binary, b"pristine-bytes").unwrap();

        let backup = ensure_backup(&binary).unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), b"pristine-bytes");
    }

    #[test]
    fn same_size_backup_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("Client.exe");
        std::fs::write(&binary, b"pristine-bytes").unwrap();
        ensure_backup(&binary).unwrap();

        // Patch in place without changing the size; the backup must keep the
        // pristine content.
        std::fs::write(&binary, b"patched!-bytes").unwrap();
        let backup = ensure_backup(&binary).unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), b"pristine-bytes");
    }

    #[test]
    fn size_change_archives_stale_backup() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("Client.exe");
        std::fs::write(&binary, b"version-seven").unwrap();
        ensure_backup(&binary).unwrap();

        // The game updater replaced the binary.
        std::fs::write(&binary, b"version-eight-is-bigger").unwrap();
        let backup = ensure_backup(&binary).unwrap();
        assert_eq!(std::fs::read(&backup).unwrap(), b"version-eight-is-bigger");

        let archived: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with("Client.exe.original.")
            })
            .collect();
        assert_eq!(archived.len(), 1);
        assert_eq!(
            std::fs::read(archived[0].path()).unwrap(),
            b"version-seven"
        );
    }

    #[test]
    fn restore_requires_backup() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("Client.exe");
        std::fs::write(&binary, b"whatever").unwrap();
        assert!(matches!(
            restore(&binary),
            Err(PatchError::BackupMissing { .. })
        ));
    }

    #[test]
    fn restore_overwrites_patched_binary() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("Client.exe");
        std::fs::write(&binary, b"pristine-bytes").unwrap();
        ensure_backup(&binary).unwrap();
        std::fs::write(&binary, b"patched!-bytes").unwrap();

        restore(&binary).unwrap();
        assert_eq!(std::fs::read(&binary).unwrap(), b"pristine-bytes");
    }
}
