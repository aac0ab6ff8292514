use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    Mismatch {
        path:     PathBuf,
        expected: String,
        actual:   String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, VerifyError>;

#[derive(Debug, thiserror::Error)]
#[error("invalid SHA256 hash: {0}")]
pub struct ParseSha256HashError(pub String);
