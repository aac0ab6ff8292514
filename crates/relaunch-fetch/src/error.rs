//! Error types for relaunch-fetch.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download of {url} failed after {attempts} attempt(s): {message}")]
    Network {
        url:      String,
        attempts: u32,
        message:  String,
    },

    #[error("checksum mismatch for {url} at {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url:      String,
        path:     PathBuf,
        expected: String,
        actual:   String,
    },

    #[error("file I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    pub(crate) fn io(path: &std::path::Path, source: io::Error) -> Self {
        FetchError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
