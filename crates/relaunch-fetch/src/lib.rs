//! Archive acquisition: HTTP downloading with retry, streaming checksum
//! verification and atomic placement.
//!
//! The acquirer reuses an existing cache file when its digest still matches,
//! evicts it when it does not, and otherwise downloads through a `.part`
//! staging file that is renamed into place only after the digest checks out.
//! Checksum mismatches are never retried automatically; the corrupt artifact
//! is deleted and the error surfaced with its URL and path.

mod acquire;
mod data;
mod error;
mod retry;

pub use acquire::{Acquirer, BoxStream, HttpClient};
pub use data::{AcquireOptions, DownloadPhase, MIN_REUSE_SIZE, Progress, ProgressFn};
pub use error::FetchError;
pub use retry::retry_delay;

#[cfg(feature = "reqwest")]
pub use acquire::ReqwestClient;
