use thiserror::Error;

use crate::version::Branch;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Fetch(#[from] relaunch_fetch::FetchError),

    #[error(transparent)]
    Deploy(#[from] relaunch_deploy::DeployError),

    /// Config-store failures surface unmodified; the collaborator owns
    /// durability semantics.
    #[error("config store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("version info request to {url} failed: {message}")]
    InfoFetch { url: String, message: String },

    #[error("version info from {url} could not be parsed: {source}")]
    InfoParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no version info for platform {platform} on branch {branch}")]
    NoPlatformEntry { platform: String, branch: Branch },
}

impl UpdateError {
    pub(crate) fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
        UpdateError::Store(Box::new(e))
    }
}
