//! Runtime-instrumentation agent placement.
//!
//! A small agent component must sit next to the server executable; it is
//! fetched when missing or undersized. Placement goes through the acquirer's
//! temp-file-then-rename path, so a crashed download never leaves a truncated
//! agent behind.

use std::path::Path;

use tracing::{debug, info};

use relaunch_fetch::{AcquireOptions, Acquirer, HttpClient};

use crate::error::PatchError;

pub const AGENT_FILE_NAME: &str = "cradle-agent.dll";
/// Anything smaller than this is a truncated download, not a real agent.
pub const AGENT_MIN_SIZE: u64 = 16 * 1024;

/// Ensure the agent exists in `dir`, downloading it when missing or
/// undersized. Returns whether a download happened.
pub async fn ensure_agent<C: HttpClient>(
    acquirer: &Acquirer<C>,
    dir: &Path,
    url: &str,
    min_size: u64,
) -> Result<bool, PatchError> {
    let target = dir.join(AGENT_FILE_NAME);

    if let Ok(meta) = std::fs::metadata(&target)
        && meta.len() >= min_size
    {
        debug!(path = %target.display(), "instrumentation agent already present");
        return Ok(false);
    }

    info!(path = %target.display(), url, "fetching instrumentation agent");
    // Single shot: the patch step runs before every launch and will try again
    // next time.
    let options = AcquireOptions::default()
        .without_retries()
        .min_reuse_size(min_size);
    acquirer.acquire(url, &target, &options).await?;
    Ok(true)
}
