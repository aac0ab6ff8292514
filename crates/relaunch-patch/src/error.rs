use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("client binary not found at {path}")]
    BinaryNotFound { path: PathBuf },

    #[error("no usable backup at {path}; cannot restore before re-patching")]
    BackupMissing { path: PathBuf },

    #[error("patch I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("patch record at {path} is unreadable: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to fetch instrumentation agent: {0}")]
    Agent(#[from] relaunch_fetch::FetchError),
}

impl PatchError {
    pub(crate) fn io(path: &std::path::Path, source: io::Error) -> Self {
        PatchError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
