//! Data layer: immutable types for download configuration and progress
//! tracking.

use std::sync::Arc;
use std::time::Duration;

use relaunch_verify::Sha256Hash;

/// An existing cache file smaller than this is never trusted for reuse; it is
/// treated as a truncated leftover and re-downloaded.
pub const MIN_REUSE_SIZE: u64 = 1024 * 1024;

#[derive(Clone)]
pub struct AcquireOptions {
    pub checksum:       Option<Sha256Hash>,
    pub max_retries:    u32,
    pub retry_backoff:  Duration,
    pub retries:        bool,
    pub min_reuse_size: u64,
    pub on_progress:    Option<ProgressFn>,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            checksum:       None,
            max_retries:    3,
            retry_backoff:  Duration::from_millis(500),
            retries:        true,
            min_reuse_size: MIN_REUSE_SIZE,
            on_progress:    None,
        }
    }
}

impl AcquireOptions {
    pub fn checksum(mut self, checksum: Option<Sha256Hash>) -> Self {
        self.checksum = checksum;
        self
    }

    /// Disable transient-failure retries for callers that want a single shot.
    pub fn without_retries(mut self) -> Self {
        self.retries = false;
        self
    }

    pub fn on_progress(mut self, callback: ProgressFn) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn min_reuse_size(mut self, size: u64) -> Self {
        self.min_reuse_size = size;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Connecting,
    Downloading,
    Verifying,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub phase:            DownloadPhase,
    pub bytes_downloaded: u64,
    pub total_bytes:      Option<u64>,
    pub retry_count:      u32,
}

impl Progress {
    pub fn percentage(&self) -> Option<f32> {
        self.total_bytes.map(|total| {
            if total == 0 {
                0.0
            } else {
                (self.bytes_downloaded as f32 / total as f32) * 100.0
            }
        })
    }
}

pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;
